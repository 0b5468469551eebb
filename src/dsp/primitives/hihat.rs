//! Hi-hat: six detuned square waves and a little noise, high-passed.

use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::dsp::envelope::EnvelopeGenerator;
use crate::dsp::filter::high_pass;
use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::error::{Result, TechnoError, ensure_non_negative, ensure_range};
use crate::preset::HatRecipe;
use crate::timing::TimingCalculator;

use super::{DEFAULT_SEED, normalize_peak};

#[derive(Debug, Clone)]
pub struct HiHat {
    timing: TimingCalculator,
    recipe: HatRecipe,
    seed: u64,
}

impl HiHat {
    pub fn new(bpm: f64) -> Result<Self> {
        Ok(Self::from_timing(TimingCalculator::new(bpm)?))
    }

    pub fn from_timing(timing: TimingCalculator) -> Self {
        HiHat {
            timing,
            recipe: HatRecipe::DEFAULT,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_recipe(mut self, recipe: HatRecipe) -> Result<Self> {
        recipe.validate()?;
        self.recipe = recipe;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn timing(&self) -> &TimingCalculator {
        &self.timing
    }

    /// One hit. `closedness` 1.0 is a tight closed hat, 0.0 rings open.
    pub fn generate(&self, closedness: f64, duration_ms: f64) -> Result<AudioBuffer> {
        ensure_range("closedness", closedness, 0.0, 1.0, "a closedness in [0, 1]")?;
        ensure_non_negative("duration_ms", duration_ms)?;

        let sample_rate = self.timing.sample_rate();
        let sr = sample_rate as f64;
        let n = self.timing.ms_to_samples(duration_ms);
        if n == 0 {
            return AudioBuffer::mono(Vec::new(), sample_rate);
        }
        let r = &self.recipe;

        let mut partials: Vec<Oscillator> = r
            .partials
            .iter()
            .map(|&hz| {
                let mut osc = Oscillator::new(Waveform::Square, sr);
                osc.frequency = hz;
                osc
            })
            .collect();
        let mut rng = fastrand::Rng::with_seed(self.seed);
        let metal_level = (1.0 - r.noise) / partials.len() as f64;
        let raw: Vec<f64> = (0..n)
            .map(|_| {
                let metal: f64 = partials.iter_mut().map(Oscillator::next_sample).sum();
                metal * metal_level + (rng.f64() * 2.0 - 1.0) * r.noise
            })
            .collect();

        let bright = high_pass(&AudioBuffer::mono(raw, sample_rate)?, r.highpass_hz)?;
        let decay_rate = r.decay_rate(closedness);
        let envelope = EnvelopeGenerator::exponential_decay(n as f64 / sr, decay_rate, sample_rate)?;
        let mut samples = envelope.apply(bright.channel(0).unwrap_or_default());
        samples.resize(n, 0.0);
        normalize_peak(&mut samples, 1.0);

        if !samples.iter().all(|s| s.is_finite()) {
            return Err(TechnoError::NumericDegenerate {
                what: format!("hi-hat at closedness {closedness}"),
            });
        }
        debug!(closedness, decay_rate, frames = n, "hi-hat rendered");
        AudioBuffer::mono(samples, sample_rate)
    }
}
