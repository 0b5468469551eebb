//! Amplitude envelopes rendered as whole sample sequences.

use crate::error::{Result, TechnoError, ensure_non_negative, ensure_range};

/// Envelope stages, in playback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Attack,
    Decay,
    Sustain,
    Release,
}

/// A rendered envelope: one gain multiplier in `[0, 1]` per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    levels: Vec<f64>,
}

impl Envelope {
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Multiply `signal` by the envelope sample-for-sample.
    ///
    /// The result has the length of the shorter of the two.
    pub fn apply(&self, signal: &[f64]) -> Vec<f64> {
        signal
            .iter()
            .zip(&self.levels)
            .map(|(s, e)| s * e)
            .collect()
    }

    pub fn into_levels(self) -> Vec<f64> {
        self.levels
    }
}

/// Sample lengths of each ADSR stage once fitted into the total duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdsrLayout {
    pub attack: usize,
    pub decay: usize,
    pub sustain: usize,
    pub release: usize,
}

impl AdsrLayout {
    pub fn total(&self) -> usize {
        self.attack + self.decay + self.sustain + self.release
    }

    pub fn stage_at(&self, index: usize) -> Stage {
        if index < self.attack {
            Stage::Attack
        } else if index < self.attack + self.decay {
            Stage::Decay
        } else if index < self.attack + self.decay + self.sustain {
            Stage::Sustain
        } else {
            Stage::Release
        }
    }

    /// Fit the stage times (seconds) into `duration`.
    ///
    /// When attack + decay + release exceed the duration, all three shrink
    /// by `duration / (attack + decay + release)` and sustain gets no samples.
    /// Stage lengths are floored to whole samples; any rounding overflow is
    /// taken out of the release.
    pub fn fit(attack: f64, decay: f64, release: f64, duration: f64, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let total = (duration * sr) as usize;
        let timed = attack + decay + release;
        let scale = if timed > duration && timed > 0.0 {
            duration / timed
        } else {
            1.0
        };

        let a = ((attack * scale * sr) as usize).min(total);
        let d = ((decay * scale * sr) as usize).min(total - a);
        let r = ((release * scale * sr) as usize).min(total - a - d);
        let s = if scale < 1.0 { 0 } else { total - a - d - r };
        // Whatever flooring left over when scaled goes to the release tail.
        let r = total - a - d - s;

        AdsrLayout {
            attack: a,
            decay: d,
            sustain: s,
            release: r,
        }
    }
}

/// Envelope construction.
pub struct EnvelopeGenerator;

impl EnvelopeGenerator {
    /// Linear attack/decay/release around a flat sustain.
    ///
    /// Times are in seconds. `sustain_level` must be within `[0, 1]`; the
    /// sustain segment holds exactly that level. The release always ends at 0.
    pub fn adsr(
        attack: f64,
        decay: f64,
        sustain_level: f64,
        release: f64,
        duration: f64,
        sample_rate: u32,
    ) -> Result<Envelope> {
        ensure_non_negative("attack", attack)?;
        ensure_non_negative("decay", decay)?;
        ensure_non_negative("release", release)?;
        ensure_non_negative("duration", duration)?;
        ensure_range(
            "sustain_level",
            sustain_level,
            0.0,
            1.0,
            "a level in [0, 1]",
        )?;
        check_rate(sample_rate)?;

        let layout = AdsrLayout::fit(attack, decay, release, duration, sample_rate);
        let mut levels = Vec::with_capacity(layout.total());

        for i in 0..layout.attack {
            levels.push(i as f64 / layout.attack as f64);
        }
        for i in 0..layout.decay {
            let t = i as f64 / layout.decay as f64;
            levels.push(1.0 - (1.0 - sustain_level) * t);
        }
        levels.extend(std::iter::repeat_n(sustain_level, layout.sustain));
        for i in 0..layout.release {
            let t = (i + 1) as f64 / layout.release as f64;
            levels.push(sustain_level * (1.0 - t));
        }

        Ok(Envelope { levels })
    }

    /// `e^(-decay_rate * t)` over `duration` seconds.
    pub fn exponential_decay(duration: f64, decay_rate: f64, sample_rate: u32) -> Result<Envelope> {
        ensure_non_negative("duration", duration)?;
        ensure_non_negative("decay_rate", decay_rate)?;
        check_rate(sample_rate)?;
        let sr = sample_rate as f64;
        let n = (duration * sr) as usize;
        Ok(Envelope {
            levels: (0..n).map(|i| (-decay_rate * i as f64 / sr).exp()).collect(),
        })
    }
}

fn check_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(TechnoError::invalid("sample_rate", 0.0, "a rate > 0 Hz"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_when_all_times_zero() {
        let env = EnvelopeGenerator::adsr(0.0, 0.0, 1.0, 0.0, 1.0, 44100).unwrap();
        assert_eq!(env.len(), 44100);
        assert!(env.levels().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn stages_in_order() {
        let env = EnvelopeGenerator::adsr(0.01, 0.02, 0.5, 0.1, 1.0, 1000).unwrap();
        let lv = env.levels();
        assert_eq!(lv.len(), 1000);
        // Attack 10 samples rising from 0.
        assert_eq!(lv[0], 0.0);
        assert!(lv[..10].windows(2).all(|w| w[1] > w[0]));
        // Decay starts at full level and heads to sustain.
        assert_eq!(lv[10], 1.0);
        assert!(lv[10..30].windows(2).all(|w| w[1] < w[0]));
        // Sustain exactly at level.
        assert!(lv[30..900].iter().all(|&v| v == 0.5));
        // Release ends at zero.
        assert_eq!(*lv.last().unwrap(), 0.0);
        assert!(lv[900..].windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn levels_in_unit_range() {
        let env = EnvelopeGenerator::adsr(0.05, 0.1, 0.7, 0.3, 2.0, 44100).unwrap();
        assert!(env.levels().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn overflowing_stages_scale_proportionally() {
        // a + d + r = 2s into 1s: each halves, no sustain.
        let layout = AdsrLayout::fit(0.4, 0.4, 1.2, 1.0, 1000);
        assert_eq!(layout.total(), 1000);
        assert_eq!(layout.attack, 200);
        assert_eq!(layout.decay, 200);
        assert_eq!(layout.sustain, 0);
        assert_eq!(layout.release, 600);

        let env = EnvelopeGenerator::adsr(0.4, 0.4, 0.6, 1.2, 1.0, 1000).unwrap();
        assert_eq!(env.len(), 1000);
        assert_eq!(*env.levels().last().unwrap(), 0.0);
    }

    #[test]
    fn exact_fit_keeps_zero_sustain() {
        let layout = AdsrLayout::fit(0.25, 0.25, 0.5, 1.0, 1000);
        assert_eq!(layout.sustain, 0);
        assert_eq!(layout.total(), 1000);
        assert_eq!(layout.stage_at(0), Stage::Attack);
        assert_eq!(layout.stage_at(250), Stage::Decay);
        assert_eq!(layout.stage_at(999), Stage::Release);
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            EnvelopeGenerator::adsr(0.0, 0.0, 1.5, 0.0, 1.0, 44100),
            Err(TechnoError::InvalidArgument { name: "sustain_level", .. })
        ));
        assert!(matches!(
            EnvelopeGenerator::adsr(-0.1, 0.0, 0.5, 0.0, 1.0, 44100),
            Err(TechnoError::InvalidArgument { name: "attack", .. })
        ));
        assert!(EnvelopeGenerator::adsr(0.0, 0.0, 0.5, -1.0, 1.0, 44100).is_err());
        assert!(EnvelopeGenerator::exponential_decay(1.0, -5.0, 44100).is_err());
    }

    #[test]
    fn exponential_decay_curve() {
        let env = EnvelopeGenerator::exponential_decay(1.0, 5.0, 1000).unwrap();
        assert_eq!(env.len(), 1000);
        assert_eq!(env.levels()[0], 1.0);
        let at_200ms = env.levels()[200];
        assert!((at_200ms - (-1.0_f64).exp()).abs() < 1e-12);
        assert!(env.levels().windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn apply_multiplies() {
        let env = EnvelopeGenerator::adsr(0.0, 0.0, 0.5, 0.0, 0.004, 1000).unwrap();
        assert_eq!(env.apply(&[1.0, -1.0, 0.5, 2.0, 9.0]), vec![0.5, -0.5, 0.25, 1.0]);
    }
}
