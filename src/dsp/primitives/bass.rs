//! Bassline synthesis: saw or square notes through a resonant low-pass.

use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::dsp::envelope::EnvelopeGenerator;
use crate::dsp::filter::resonant_filter;
use crate::dsp::oscillator::Oscillator;
use crate::error::{Result, TechnoError, ensure_range};
use crate::preset::{BassPattern, BassRecipe, BassStep};
use crate::timing::TimingCalculator;

use super::midi_to_frequency;

/// Lowest playable bass frequency (Hz).
pub const MIN_BASS_HZ: f64 = 20.0;
/// Highest playable bass frequency (Hz).
pub const MAX_BASS_HZ: f64 = 2000.0;

/// Peak level of each rendered note.
const NOTE_PEAK: f64 = 0.9;

/// Unaccented pattern steps sit this many dB under accented ones.
pub const ACCENT_DB: f64 = 3.0;
/// Cutoff multiplier for accented steps.
pub const ACCENT_CUTOFF_RATIO: f64 = 1.5;
/// Accented cutoffs stay below this fraction of the sample rate.
const MAX_CUTOFF_RATIO: f64 = 0.45;

#[derive(Debug, Clone)]
pub struct Bass {
    timing: TimingCalculator,
    recipe: BassRecipe,
}

impl Bass {
    pub fn new(bpm: f64) -> Result<Self> {
        Ok(Self::from_timing(TimingCalculator::new(bpm)?))
    }

    pub fn from_timing(timing: TimingCalculator) -> Self {
        Bass {
            timing,
            recipe: BassRecipe::DEFAULT,
        }
    }

    pub fn with_recipe(mut self, recipe: BassRecipe) -> Result<Self> {
        recipe.validate()?;
        self.recipe = recipe;
        Ok(self)
    }

    pub fn recipe(&self) -> &BassRecipe {
        &self.recipe
    }

    pub fn timing(&self) -> &TimingCalculator {
        &self.timing
    }

    /// One note lasting `duration_bars` bars.
    ///
    /// The ADSR times are the recipe's fractions of the note length, so short
    /// and long notes keep the same shape. A zero duration gives an empty
    /// buffer.
    pub fn generate_note(&self, frequency: f64, duration_bars: f64) -> Result<AudioBuffer> {
        self.render_note(&self.recipe, frequency, duration_bars)
    }

    fn render_note(&self, recipe: &BassRecipe, frequency: f64, duration_bars: f64) -> Result<AudioBuffer> {
        ensure_range(
            "frequency",
            frequency,
            MIN_BASS_HZ,
            MAX_BASS_HZ,
            "a bass frequency in [20, 2000] Hz",
        )?;
        if !(duration_bars.is_finite() && duration_bars >= 0.0) {
            return Err(TechnoError::invalid(
                "duration_bars",
                duration_bars,
                "a duration >= 0 bars",
            ));
        }

        let sample_rate = self.timing.sample_rate();
        let n = self.timing.bars_to_samples(duration_bars);
        if n == 0 {
            return AudioBuffer::mono(Vec::new(), sample_rate);
        }
        let duration = n as f64 / sample_rate as f64;
        let r = recipe;

        let mut osc = Oscillator::new(r.waveform, sample_rate as f64);
        osc.frequency = frequency;
        let core: Vec<f64> = (0..n).map(|_| osc.next_sample()).collect();

        let envelope = EnvelopeGenerator::adsr(
            r.attack * duration,
            r.decay * duration,
            r.sustain_level,
            r.release * duration,
            duration,
            sample_rate,
        )?;
        let mut shaped = envelope.apply(&core);
        shaped.resize(n, 0.0);

        let filtered = resonant_filter(&AudioBuffer::mono(shaped, sample_rate)?, r.cutoff_hz, r.resonance)?;
        filtered.normalize(NOTE_PEAK)
    }

    /// [`BassPattern::DEFAULT`]: eight bars of eighth notes.
    pub fn generate(&self) -> Result<AudioBuffer> {
        self.generate_pattern(&BassPattern::DEFAULT)
    }

    /// Render `pattern` onto its grid, cycling notes and steps per index.
    ///
    /// Rests stay silent. Accented steps get a brighter filter and play
    /// [`ACCENT_DB`] louder than plain ones. The result is exactly
    /// `pattern.bars` bars long.
    pub fn generate_pattern(&self, pattern: &BassPattern) -> Result<AudioBuffer> {
        pattern.validate()?;
        let bars = pattern.bars as i64;
        let subdivision = pattern.subdivision as i64;
        let grid = self.timing.create_sample_grid(bars, subdivision)?;

        let step_bars = pattern.gate / pattern.subdivision as f64;
        let plain = pattern
            .notes
            .iter()
            .map(|&midi| {
                self.generate_note(midi_to_frequency(midi), step_bars)?
                    .gain_db(-ACCENT_DB)
            })
            .collect::<Result<Vec<_>>>()?;
        let accented = if pattern.steps.contains('.') {
            let bright = BassRecipe {
                cutoff_hz: (self.recipe.cutoff_hz * ACCENT_CUTOFF_RATIO)
                    .min(self.timing.sample_rate() as f64 * MAX_CUTOFF_RATIO),
                ..self.recipe
            };
            pattern
                .notes
                .iter()
                .map(|&midi| self.render_note(&bright, midi_to_frequency(midi), step_bars))
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let total = self.timing.bars_to_samples(pattern.bars as f64);
        let mut out = AudioBuffer::silent(total, 1, self.timing.sample_rate())?;
        let mut played = 0usize;
        for (index, &offset) in grid.iter().enumerate() {
            let note = index % pattern.notes.len();
            match pattern.step(index) {
                BassStep::Note => out.mix_in(&plain[note], offset)?,
                BassStep::Accent => out.mix_in(&accented[note], offset)?,
                BassStep::Rest => continue,
            }
            played += 1;
        }
        debug!(
            bpm = self.timing.bpm(),
            bars = pattern.bars,
            steps = grid.len(),
            played,
            "bass pattern rendered"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::Waveform;
    use std::borrow::Cow;

    #[test]
    fn rejects_bad_tempo() {
        assert!(matches!(Bass::new(20.0), Err(TechnoError::InvalidTempo { .. })));
    }

    #[test]
    fn note_length_follows_bars() {
        let bass = Bass::new(120.0).unwrap();
        let note = bass.generate_note(110.0, 0.25).unwrap();
        // Quarter bar at 120 BPM = 500 ms.
        assert_eq!(note.len(), 22050);
        assert!((note.peak() - NOTE_PEAK).abs() < 1e-9);
        assert!(note.is_finite());
    }

    #[test]
    fn frequency_range_enforced() {
        let bass = Bass::new(120.0).unwrap();
        for hz in [10.0, 2500.0, -55.0, f64::NAN] {
            assert!(matches!(
                bass.generate_note(hz, 0.25),
                Err(TechnoError::InvalidArgument { name: "frequency", .. })
            ));
        }
        assert!(bass.generate_note(20.0, 0.1).is_ok());
        assert!(bass.generate_note(2000.0, 0.1).is_ok());
    }

    #[test]
    fn duration_edges() {
        let bass = Bass::new(120.0).unwrap();
        assert!(bass.generate_note(110.0, -1.0).is_err());
        assert!(bass.generate_note(110.0, 0.0).unwrap().is_empty());
    }

    #[test]
    fn envelope_shapes_note() {
        let bass = Bass::new(120.0).unwrap();
        let note = bass.generate_note(110.0, 0.5).unwrap();
        let ch = note.channel(0).unwrap();
        let n = ch.len();
        let mid: f64 = ch[n / 3..n / 2].iter().map(|s| s * s).sum();
        let end: f64 = ch[n - n / 20..].iter().map(|s| s * s).sum();
        assert!(end < mid * 0.1, "Release should fade the note out");
    }

    #[test]
    fn waveform_follows_recipe() {
        let saw = Bass::new(120.0).unwrap();
        let square = Bass::new(120.0)
            .unwrap()
            .with_recipe(BassRecipe {
                waveform: Waveform::Square,
                ..BassRecipe::DEFAULT
            })
            .unwrap();
        assert_ne!(
            saw.generate_note(55.0, 0.25).unwrap(),
            square.generate_note(55.0, 0.25).unwrap()
        );
    }

    #[test]
    fn default_pattern_spans_eight_bars() {
        let bass = Bass::new(125.0).unwrap();
        let out = bass.generate().unwrap();
        assert_eq!(out.len(), bass.timing().bars_to_samples(8.0));
        assert!(out.is_finite());
        assert!(out.energy() > 0.0);
    }

    #[test]
    fn every_step_sounds() {
        let bass = Bass::new(120.0).unwrap();
        let pattern = BassPattern {
            bars: 1,
            subdivision: 4,
            notes: Cow::Borrowed(&[36, 48]),
            gate: 0.5,
            steps: Cow::Borrowed("x"),
        };
        let out = bass.generate_pattern(&pattern).unwrap();
        let ch = out.channel(0).unwrap();
        let step = ch.len() / 4;
        for s in 0..4 {
            let sounding: f64 = ch[s * step..s * step + step / 2].iter().map(|x| x * x).sum();
            let gap: f64 = ch[s * step + step / 2 + 200..(s + 1) * step].iter().map(|x| x * x).sum();
            assert!(sounding > 0.0, "Step {s} should sound");
            assert!(gap < sounding * 0.01, "Step {s} should be gated");
        }
    }

    #[test]
    fn rests_silent_and_accents_louder() {
        let bass = Bass::new(120.0).unwrap();
        let pattern = BassPattern {
            bars: 1,
            subdivision: 4,
            notes: Cow::Borrowed(&[45]),
            gate: 0.5,
            steps: Cow::Borrowed("x-.-"),
        };
        let out = bass.generate_pattern(&pattern).unwrap();
        let ch = out.channel(0).unwrap();
        // Quarter notes at 120 BPM: 22050 samples per step.
        let step = 22050;
        let peak = |s: usize| ch[s * step..(s + 1) * step].iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        assert_eq!(peak(1), 0.0, "Rest should be silent");
        assert_eq!(peak(3), 0.0, "Rest should be silent");
        assert!(peak(0) > 0.0);
        let ratio = peak(2) / peak(0);
        assert!(
            (ratio - crate::buffer::db_to_linear(ACCENT_DB)).abs() < 1e-9,
            "Accent should be {ACCENT_DB} dB louder, ratio {ratio}"
        );
        assert!(out.peak() <= NOTE_PEAK + 1e-12);
    }

    #[test]
    fn accent_brightens_filter() {
        let bass = Bass::new(120.0).unwrap();
        let single = |steps: &'static str| BassPattern {
            bars: 1,
            subdivision: 1,
            notes: Cow::Borrowed(&[40]),
            gate: 1.0,
            steps: Cow::Borrowed(steps),
        };
        let plain = bass.generate_pattern(&single("x")).unwrap().normalize(1.0).unwrap();
        let accent = bass.generate_pattern(&single(".")).unwrap().normalize(1.0).unwrap();
        assert_ne!(plain, accent, "Accent should change the timbre, not only the level");
    }

    #[test]
    fn acid_pattern_renders() {
        let bass = Bass::new(138.0).unwrap().with_recipe(BassRecipe::ACID).unwrap();
        let out = bass.generate_pattern(&BassPattern::ACID).unwrap();
        assert_eq!(out.len(), bass.timing().bars_to_samples(4.0));
        assert!(out.is_finite());
        assert!(out.energy() > 0.0);
    }

    #[test]
    fn invalid_pattern_rejected() {
        let bass = Bass::new(120.0).unwrap();
        let pattern = BassPattern {
            subdivision: 0,
            ..BassPattern::DEFAULT
        };
        assert!(bass.generate_pattern(&pattern).is_err());
    }
}
