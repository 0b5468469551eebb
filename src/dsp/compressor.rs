//! Compressor and limiter: dynamics processing for audio leveling.
//!
//! Feed-forward design: a peak envelope follower drives a hard-knee gain
//! computer, and the resulting gain change is smoothed with separate attack
//! and release time constants before it is applied. Channels are linked.

use crate::buffer::{AudioBuffer, db_to_linear, linear_to_db};
use crate::error::{Result, TechnoError, ensure_finite, ensure_non_negative};

/// Limiter attack in milliseconds.
const LIMITER_ATTACK_MS: f64 = 0.1;
/// Limiter release in milliseconds.
const LIMITER_RELEASE_MS: f64 = 50.0;

/// A linked multi-channel dynamics compressor.
#[derive(Debug, Clone)]
pub struct Compressor {
    sample_rate: f64,

    /// Threshold in dB.
    pub threshold: f64,
    /// Compression ratio (e.g., 4.0 = 4:1). `f64::INFINITY` limits.
    pub ratio: f64,
    /// Attack time in seconds.
    pub attack: f64,
    /// Release time in seconds.
    pub release: f64,

    // Internal state
    envelope: f64,
    gain_db: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            threshold: -24.0,
            ratio: 4.0,
            attack: 0.003,
            release: 0.25,
            envelope: 0.0,
            gain_db: 0.0,
        }
    }

    pub fn with_params(sample_rate: f64, threshold: f64, ratio: f64, attack: f64, release: f64) -> Self {
        let mut c = Self::new(sample_rate);
        c.threshold = threshold;
        c.ratio = ratio;
        c.attack = attack;
        c.release = release;
        c
    }

    #[inline]
    fn coefficient(&self, seconds: f64) -> f64 {
        (-1.0 / (seconds * self.sample_rate)).exp()
    }

    /// Gain change in dB (<= 0) for an input level in dB.
    #[inline]
    pub fn compute_gain(&self, input_db: f64) -> f64 {
        if input_db <= self.threshold {
            0.0
        } else {
            (self.threshold - input_db) * (1.0 - 1.0 / self.ratio)
        }
    }

    /// Advance one frame and return the linear gain to apply to it.
    #[inline]
    pub fn next_gain(&mut self, frame_peak: f64) -> f64 {
        // Peak follower: instant rise, release-smoothed fall.
        if frame_peak > self.envelope {
            self.envelope = frame_peak;
        } else {
            let rel = self.coefficient(self.release);
            self.envelope = rel * self.envelope + (1.0 - rel) * frame_peak;
        }

        let target = self.compute_gain(linear_to_db(self.envelope));
        let coef = if target < self.gain_db {
            self.coefficient(self.attack)
        } else {
            self.coefficient(self.release)
        };
        self.gain_db = coef * self.gain_db + (1.0 - coef) * target;

        db_to_linear(self.gain_db)
    }

    /// Run the whole buffer, channels linked on their common peak.
    pub fn process_buffer(&mut self, buffer: &AudioBuffer) -> AudioBuffer {
        let channels = buffer.channels();
        let mut out = vec![Vec::with_capacity(buffer.len()); channels.len()];
        for i in 0..buffer.len() {
            let peak = channels.iter().fold(0.0_f64, |m, ch| m.max(ch[i].abs()));
            let gain = self.next_gain(peak);
            for (dst, ch) in out.iter_mut().zip(channels) {
                dst.push(ch[i] * gain);
            }
        }
        buffer.with_channels(out)
    }
}

/// Compress everything above `threshold_db` at `ratio`:1.
pub fn compress(
    buffer: &AudioBuffer,
    threshold_db: f64,
    ratio: f64,
    attack_ms: f64,
    release_ms: f64,
) -> Result<AudioBuffer> {
    ensure_finite("threshold_db", threshold_db)?;
    if ratio.is_nan() || ratio < 1.0 {
        return Err(TechnoError::invalid("ratio", ratio, "a ratio >= 1"));
    }
    ensure_non_negative("attack_ms", attack_ms)?;
    ensure_non_negative("release_ms", release_ms)?;

    let mut comp = Compressor::with_params(
        buffer.sample_rate() as f64,
        threshold_db,
        ratio,
        attack_ms / 1000.0,
        release_ms / 1000.0,
    );
    Ok(comp.process_buffer(buffer))
}

/// Brick-wall limiter: no output sample exceeds `ceiling_db` dBFS.
///
/// An infinite-ratio compressor with a fast attack shapes the gain; a
/// per-sample cap catches anything the smoothed gain has not reached yet.
pub fn limit(buffer: &AudioBuffer, ceiling_db: f64) -> Result<AudioBuffer> {
    ensure_finite("ceiling_db", ceiling_db)?;
    if ceiling_db > 0.0 {
        return Err(TechnoError::invalid("ceiling_db", ceiling_db, "a ceiling <= 0 dBFS"));
    }
    let ceiling = db_to_linear(ceiling_db);
    let mut comp = Compressor::with_params(
        buffer.sample_rate() as f64,
        ceiling_db,
        f64::INFINITY,
        LIMITER_ATTACK_MS / 1000.0,
        LIMITER_RELEASE_MS / 1000.0,
    );

    let channels = buffer.channels();
    let mut out = vec![Vec::with_capacity(buffer.len()); channels.len()];
    for i in 0..buffer.len() {
        let peak = channels.iter().fold(0.0_f64, |m, ch| m.max(ch[i].abs()));
        let mut gain = comp.next_gain(peak);
        if peak * gain > ceiling {
            gain = ceiling / peak;
        }
        for (dst, ch) in out.iter_mut().zip(channels) {
            dst.push((ch[i] * gain).clamp(-ceiling, ceiling));
        }
    }
    Ok(buffer.with_channels(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::WaveformGenerator;

    fn constant(level: f64, len: usize) -> AudioBuffer {
        AudioBuffer::mono(vec![level; len], 44100).unwrap()
    }

    #[test]
    fn passthrough_below_threshold() {
        let out = compress(&constant(0.05, 2000), -20.0, 4.0, 1.0, 100.0).unwrap();
        let last = *out.channel(0).unwrap().last().unwrap();
        assert!((last - 0.05).abs() < 1e-9, "Below threshold should pass, got {last}");
    }

    #[test]
    fn reduces_loud_signals() {
        let out = compress(&constant(1.0, 20000), -12.0, 4.0, 1.0, 100.0).unwrap();
        let last = *out.channel(0).unwrap().last().unwrap();
        // 12 dB over at 4:1 -> 9 dB of reduction.
        assert!((linear_to_db(last) + 9.0).abs() < 0.1, "Expected ~-9 dB, got {last}");
    }

    #[test]
    fn attack_is_gradual() {
        let out = compress(&constant(1.0, 5000), -20.0, 10.0, 10.0, 500.0).unwrap();
        let ch = out.channel(0).unwrap();
        assert!(ch[0] > ch[500], "First sample should be louder than after attack");
        assert!(ch[500] > ch[4999]);
    }

    #[test]
    fn release_recovers_gain() {
        let mut samples = vec![1.0; 2000];
        samples.extend(vec![0.1; 10000]);
        let out = compress(&AudioBuffer::mono(samples, 44100).unwrap(), -20.0, 10.0, 1.0, 50.0).unwrap();
        let ch = out.channel(0).unwrap();
        assert!(ch[11999] > ch[2001], "Gain should recover after the loud part");
    }

    #[test]
    fn reduces_dynamic_range() {
        let mut samples = vec![0.15; 1000];
        samples.extend(vec![0.6; 1000]);
        samples.extend(vec![0.15; 1000]);
        let input = AudioBuffer::mono(samples, 44100).unwrap();
        let out = compress(&input, -20.0, 4.0, 5.0, 50.0).unwrap();
        let ch = out.channel(0).unwrap();
        assert!(ch[1999] / ch[999] < 0.6 / 0.15);
    }

    #[test]
    fn ratio_below_one_rejected() {
        assert!(matches!(
            compress(&constant(0.5, 10), -20.0, 0.5, 5.0, 50.0),
            Err(TechnoError::InvalidArgument { name: "ratio", .. })
        ));
        assert!(compress(&constant(0.5, 10), -20.0, 4.0, -1.0, 50.0).is_err());
    }

    #[test]
    fn gain_computer_is_hard_knee() {
        let c = Compressor::with_params(44100.0, -20.0, 4.0, 0.001, 0.1);
        assert_eq!(c.compute_gain(-23.0), 0.0);
        assert_eq!(c.compute_gain(-20.0), 0.0);
        assert!((c.compute_gain(-12.0) + 6.0).abs() < 1e-9, "8 dB over at 4:1 is -6 dB");
        let limiter = Compressor::with_params(44100.0, -1.0, f64::INFINITY, 0.001, 0.1);
        assert!((limiter.compute_gain(5.0) + 6.0).abs() < 1e-9);
    }

    #[test]
    fn limiter_never_exceeds_ceiling() {
        let mut rng = fastrand::Rng::with_seed(7);
        let samples: Vec<f64> = (0..20000).map(|_| (rng.f64() * 2.0 - 1.0) * 4.0).collect();
        let out = limit(&AudioBuffer::mono(samples, 44100).unwrap(), -1.0).unwrap();
        let ceiling = db_to_linear(-1.0);
        assert!(out.peak() <= ceiling, "Peak {} over ceiling {ceiling}", out.peak());
    }

    #[test]
    fn limiter_leaves_quiet_audio() {
        let input = AudioBuffer::mono(WaveformGenerator::sine(100.0, 0.1, 44100).unwrap(), 44100)
            .unwrap()
            .gain_db(-12.0)
            .unwrap();
        let out = limit(&input, -1.0).unwrap();
        for (a, b) in input.channel(0).unwrap().iter().zip(out.channel(0).unwrap()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn limiter_links_stereo() {
        let st = AudioBuffer::stereo(vec![2.0; 100], vec![0.5; 100], 44100).unwrap();
        let out = limit(&st, 0.0).unwrap();
        let l = out.channel(0).unwrap()[50];
        let r = out.channel(1).unwrap()[50];
        assert!(l <= 1.0);
        assert!((l / r - 4.0).abs() < 1e-9, "Channel balance should be kept");
    }

    #[test]
    fn ceiling_must_be_at_or_below_full_scale() {
        assert!(limit(&constant(0.5, 10), 1.0).is_err());
        assert!(limit(&constant(0.5, 10), f64::NAN).is_err());
    }
}
