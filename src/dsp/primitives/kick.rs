//! Kick drum: a pitch-swept sine with a body layer and a noise click.
//!
//! All styles share one render routine; a [`KickRecipe`] decides the sweep,
//! envelope, layer balance and saturation.

use tracing::debug;

use crate::buffer::AudioBuffer;
use crate::dsp::distortion::saturate;
use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::error::Result;
use crate::preset::{KickRecipe, KickStyle};
use crate::timing::TimingCalculator;

use super::{DEFAULT_SEED, normalize_peak};

/// Decay rate (1/s) of the body layer.
const PUNCH_DECAY: f64 = 15.0;
/// Decay rate (1/s) of the click transient.
const CLICK_DECAY: f64 = 100.0;

// Layer balance before normalization.
const SUB_LEVEL: f64 = 0.7;
const PUNCH_LEVEL: f64 = 0.5;
const CLICK_LEVEL: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct Kick {
    timing: TimingCalculator,
    seed: u64,
}

impl Kick {
    /// Fails with `InvalidTempo` for a BPM outside the supported range.
    pub fn new(bpm: f64) -> Result<Self> {
        Ok(Self::from_timing(TimingCalculator::new(bpm)?))
    }

    pub fn from_timing(timing: TimingCalculator) -> Self {
        Kick {
            timing,
            seed: DEFAULT_SEED,
        }
    }

    /// Seed for the click noise. Equal seeds render identical hits.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn timing(&self) -> &TimingCalculator {
        &self.timing
    }

    /// The minimal kick.
    pub fn generate(&self) -> Result<AudioBuffer> {
        self.generate_minimal()
    }

    pub fn generate_minimal(&self) -> Result<AudioBuffer> {
        self.render(&KickRecipe::MINIMAL)
    }

    pub fn generate_industrial(&self) -> Result<AudioBuffer> {
        self.render(&KickRecipe::INDUSTRIAL)
    }

    pub fn generate_style(&self, style: KickStyle) -> Result<AudioBuffer> {
        self.render(&style.recipe())
    }

    /// Render one hit, `decay_ms` long, peak-normalized to full scale before
    /// any saturation.
    pub fn render(&self, recipe: &KickRecipe) -> Result<AudioBuffer> {
        recipe.validate()?;
        let sample_rate = self.timing.sample_rate();
        let sr = sample_rate as f64;
        let n = self.timing.ms_to_samples(recipe.decay_ms);
        let attack = self.timing.ms_to_samples(recipe.attack_ms);

        let mut rng = fastrand::Rng::with_seed(self.seed);
        let mut body = Oscillator::new(Waveform::Sine, sr);
        let mut punch = Oscillator::new(Waveform::Sine, sr);
        punch.frequency = recipe.punch_hz;

        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f64 / sr;
            body.frequency =
                recipe.sub_hz * (1.0 + recipe.sweep_depth * (-recipe.sweep_rate * t).exp());
            let sub = body.next_sample();
            let punch_layer = punch.next_sample() * (-PUNCH_DECAY * t).exp() * recipe.punch;
            let click = (rng.f64() * 2.0 - 1.0) * (-CLICK_DECAY * t).exp() * recipe.click;

            let amp = if i < attack {
                i as f64 / attack as f64
            } else {
                (-recipe.decay_rate * (i - attack) as f64 / sr).exp()
            };
            samples.push((sub * SUB_LEVEL + punch_layer * PUNCH_LEVEL + click * CLICK_LEVEL) * amp);
        }

        normalize_peak(&mut samples, 1.0);
        if recipe.drive > 0.0 {
            for s in samples.iter_mut() {
                *s = saturate(*s, recipe.drive);
            }
        }
        debug!(
            bpm = self.timing.bpm(),
            sub_hz = recipe.sub_hz,
            frames = n,
            "kick rendered"
        );
        AudioBuffer::mono(samples, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TechnoError;

    fn zero_crossings(samples: &[f64]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    #[test]
    fn rejects_bad_tempo() {
        assert!(matches!(Kick::new(0.0), Err(TechnoError::InvalidTempo { .. })));
        assert!(matches!(Kick::new(500.0), Err(TechnoError::InvalidTempo { .. })));
    }

    #[test]
    fn default_is_minimal() {
        let kick = Kick::new(128.0).unwrap();
        assert_eq!(kick.generate().unwrap(), kick.generate_minimal().unwrap());
        assert_eq!(
            kick.generate_style(KickStyle::Industrial).unwrap(),
            kick.generate_industrial().unwrap()
        );
    }

    #[test]
    fn lengths_follow_recipe() {
        let kick = Kick::new(128.0).unwrap();
        let minimal = kick.generate_minimal().unwrap();
        let industrial = kick.generate_industrial().unwrap();
        assert_eq!(minimal.len(), kick.timing().ms_to_samples(150.0));
        assert_eq!(industrial.len(), kick.timing().ms_to_samples(250.0));
        assert!(!minimal.is_stereo());
    }

    #[test]
    fn normalized_to_full_scale() {
        let kick = Kick::new(130.0).unwrap();
        let minimal = kick.generate_minimal().unwrap();
        assert!((minimal.peak() - 1.0).abs() < 1e-12);
        let industrial = kick.generate_industrial().unwrap();
        assert!(industrial.peak() <= 1.0);
        assert!(industrial.is_finite());
    }

    #[test]
    fn pitch_falls() {
        let recipe = KickRecipe {
            punch: 0.0,
            click: 0.0,
            attack_ms: 0.0,
            ..KickRecipe::INDUSTRIAL
        };
        let out = Kick::new(120.0).unwrap().render(&recipe).unwrap();
        let ch = out.channel(0).unwrap();
        let window = 44100 * 40 / 1000;
        let early = zero_crossings(&ch[..window]);
        let late = zero_crossings(&ch[2 * window..3 * window]);
        assert!(early > late, "Sweep should fall: {early} early vs {late} late");
    }

    #[test]
    fn tail_decays() {
        let out = Kick::new(120.0).unwrap().generate_minimal().unwrap();
        let ch = out.channel(0).unwrap();
        let n = ch.len();
        let head: f64 = ch[..n / 4].iter().map(|s| s * s).sum();
        let tail: f64 = ch[3 * n / 4..].iter().map(|s| s * s).sum();
        assert!(tail < head * 0.1, "Tail energy {tail} vs head {head}");
    }

    #[test]
    fn seeded_noise_is_deterministic() {
        let a = Kick::new(125.0).unwrap().with_seed(1).generate().unwrap();
        let b = Kick::new(125.0).unwrap().with_seed(1).generate().unwrap();
        let c = Kick::new(125.0).unwrap().with_seed(2).generate().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn invalid_recipe_rejected() {
        let recipe = KickRecipe {
            drive: 1.5,
            ..KickRecipe::MINIMAL
        };
        assert!(Kick::new(120.0).unwrap().render(&recipe).is_err());
    }
}
