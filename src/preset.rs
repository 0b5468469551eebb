//! Style presets: the parameter bundles primitives and mastering chains consume.
//!
//! Everything here is plain data that round-trips through JSON. A preset is
//! validated as a whole before any of its numbers reach the DSP code, so a bad
//! file fails at load time naming the offending field.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::buffer::{AudioBuffer, DEFAULT_SAMPLE_RATE};
use crate::dsp::compressor::{compress, limit};
use crate::dsp::delay::{delay, haas_widen, stereo_width};
use crate::dsp::distortion::{bit_crush, hard_clip, soft_clip};
use crate::dsp::filter::{band_pass, filter_sweep, high_pass, low_pass, resonant_filter};
use crate::dsp::oscillator::Waveform;
use crate::dsp::primitives::midi_to_frequency;
use crate::error::{Result, TechnoError, ensure_non_negative, ensure_positive, ensure_range};
use crate::timing::Tempo;

// ── Kick ────────────────────────────────────────────────────

/// Synthesis parameters for one kick drum hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KickRecipe {
    /// Fundamental the pitch sweep settles on (Hz).
    pub sub_hz: f64,
    /// Frequency of the body layer (Hz).
    pub punch_hz: f64,
    pub attack_ms: f64,
    /// Total hit length.
    pub decay_ms: f64,
    /// The sweep starts at `sub_hz * (1 + sweep_depth)`.
    pub sweep_depth: f64,
    /// Exponential rate (1/s) at which the sweep falls to `sub_hz`.
    pub sweep_rate: f64,
    /// Exponential amplitude decay rate (1/s) after the attack.
    pub decay_rate: f64,
    /// Body layer amount, 0..1.
    pub punch: f64,
    /// Noise click amount, 0..1.
    pub click: f64,
    /// Soft-clip drive applied after normalization; 0 disables it.
    pub drive: f64,
}

impl KickRecipe {
    /// Clean and tight.
    pub const MINIMAL: KickRecipe = KickRecipe {
        sub_hz: 55.0,
        punch_hz: 75.0,
        attack_ms: 3.0,
        decay_ms: 150.0,
        sweep_depth: 1.0,
        sweep_rate: 40.0,
        decay_rate: 25.0,
        punch: 0.6,
        click: 0.4,
        drive: 0.0,
    };

    /// Long sweep, maximum body, saturated.
    pub const INDUSTRIAL: KickRecipe = KickRecipe {
        sub_hz: 45.0,
        punch_hz: 90.0,
        attack_ms: 2.0,
        decay_ms: 250.0,
        sweep_depth: 3.0,
        sweep_rate: 25.0,
        decay_rate: 14.0,
        punch: 1.0,
        click: 0.6,
        drive: 0.7,
    };

    pub fn validate(&self) -> Result<()> {
        ensure_range("sub_hz", self.sub_hz, 20.0, 200.0, "a fundamental in [20, 200] Hz")?;
        ensure_range("punch_hz", self.punch_hz, 20.0, 500.0, "a body frequency in [20, 500] Hz")?;
        ensure_positive("decay_ms", self.decay_ms)?;
        ensure_range("attack_ms", self.attack_ms, 0.0, self.decay_ms, "an attack within decay_ms")?;
        ensure_range("sweep_depth", self.sweep_depth, 0.0, 8.0, "a sweep depth in [0, 8]")?;
        ensure_non_negative("sweep_rate", self.sweep_rate)?;
        ensure_non_negative("decay_rate", self.decay_rate)?;
        ensure_range("punch", self.punch, 0.0, 1.0, "an amount in [0, 1]")?;
        ensure_range("click", self.click, 0.0, 1.0, "an amount in [0, 1]")?;
        ensure_range("drive", self.drive, 0.0, 1.0, "a drive in [0, 1]")?;
        Ok(())
    }
}

impl Default for KickRecipe {
    fn default() -> Self {
        KickRecipe::MINIMAL
    }
}

/// Named kick recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KickStyle {
    Minimal,
    Industrial,
}

impl KickStyle {
    pub fn recipe(self) -> KickRecipe {
        match self {
            KickStyle::Minimal => KickRecipe::MINIMAL,
            KickStyle::Industrial => KickRecipe::INDUSTRIAL,
        }
    }
}

// ── Bass ────────────────────────────────────────────────────

/// Tone of a single bass note. Envelope times are fractions of the note length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BassRecipe {
    pub waveform: Waveform,
    pub attack: f64,
    pub decay: f64,
    pub sustain_level: f64,
    pub release: f64,
    pub cutoff_hz: f64,
    /// 0..1, mapped onto filter Q.
    pub resonance: f64,
}

impl BassRecipe {
    pub const DEFAULT: BassRecipe = BassRecipe {
        waveform: Waveform::Sawtooth,
        attack: 0.02,
        decay: 0.25,
        sustain_level: 0.7,
        release: 0.2,
        cutoff_hz: 800.0,
        resonance: 0.3,
    };

    /// Hollow square core with a brighter, more resonant filter.
    pub const ACID: BassRecipe = BassRecipe {
        waveform: Waveform::Square,
        attack: 0.01,
        decay: 0.4,
        sustain_level: 0.4,
        release: 0.1,
        cutoff_hz: 1200.0,
        resonance: 0.6,
    };

    pub fn validate(&self) -> Result<()> {
        ensure_range("attack", self.attack, 0.0, 1.0, "a fraction of the note in [0, 1]")?;
        ensure_range("decay", self.decay, 0.0, 1.0, "a fraction of the note in [0, 1]")?;
        ensure_range("release", self.release, 0.0, 1.0, "a fraction of the note in [0, 1]")?;
        ensure_range("sustain_level", self.sustain_level, 0.0, 1.0, "a level in [0, 1]")?;
        ensure_positive("cutoff_hz", self.cutoff_hz)?;
        ensure_range("resonance", self.resonance, 0.0, 1.0, "a resonance in [0, 1]")?;
        Ok(())
    }
}

impl Default for BassRecipe {
    fn default() -> Self {
        BassRecipe::DEFAULT
    }
}

/// What a bass pattern does on one grid step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassStep {
    Note,
    Accent,
    Rest,
}

impl BassStep {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'x' => Some(BassStep::Note),
            '.' => Some(BassStep::Accent),
            '-' => Some(BassStep::Rest),
            _ => None,
        }
    }
}

/// A repeating bassline on a grid of `bars * subdivision` steps.
///
/// Step `i` plays `notes[i % notes.len()]` as directed by the character
/// `steps[i % steps.len()]`: `x` plays, `.` plays accented, `-` rests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BassPattern {
    pub bars: u32,
    /// Steps per bar (8 = eighth notes).
    pub subdivision: u32,
    /// MIDI note numbers.
    pub notes: Cow<'static, [i32]>,
    /// Portion of each step the note sounds, `(0, 1]`.
    pub gate: f64,
    #[serde(default = "BassPattern::every_step")]
    pub steps: Cow<'static, str>,
}

impl BassPattern {
    /// Eight bars of eighth notes over E2, F#2, A2, B2.
    pub const DEFAULT: BassPattern = BassPattern {
        bars: 8,
        subdivision: 8,
        notes: Cow::Borrowed(&[40, 42, 45, 47]),
        gate: 1.0,
        steps: Cow::Borrowed("x"),
    };

    /// Four bars of gated sixteenths with rests and accents.
    pub const ACID: BassPattern = BassPattern {
        bars: 4,
        subdivision: 16,
        notes: Cow::Borrowed(&[40, 42, 45, 47]),
        gate: 0.8,
        steps: Cow::Borrowed("x-x.x-.x"),
    };

    fn every_step() -> Cow<'static, str> {
        Cow::Borrowed("x")
    }

    /// The step at grid index `index`.
    pub fn step(&self, index: usize) -> BassStep {
        self.steps
            .chars()
            .nth(index % self.steps.chars().count().max(1))
            .and_then(BassStep::from_char)
            .unwrap_or(BassStep::Rest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subdivision == 0 {
            return Err(TechnoError::invalid("subdivision", 0.0, "a subdivision > 0"));
        }
        if self.notes.is_empty() {
            return Err(TechnoError::invalid("notes", 0.0, "at least one note"));
        }
        if self.steps.is_empty() {
            return Err(TechnoError::invalid("steps", 0.0, "at least one step"));
        }
        if let Some(pos) = self.steps.chars().position(|c| BassStep::from_char(c).is_none()) {
            return Err(TechnoError::invalid(
                "steps",
                pos as f64,
                "only `x` (note), `.` (accent) and `-` (rest)",
            ));
        }
        for &note in self.notes.iter() {
            ensure_range(
                "notes",
                midi_to_frequency(note),
                20.0,
                2000.0,
                "notes between 20 and 2000 Hz",
            )?;
        }
        if !(self.gate.is_finite() && self.gate > 0.0 && self.gate <= 1.0) {
            return Err(TechnoError::invalid("gate", self.gate, "a gate in (0, 1]"));
        }
        Ok(())
    }
}

impl Default for BassPattern {
    fn default() -> Self {
        BassPattern::DEFAULT
    }
}

// ── Hi-hat ──────────────────────────────────────────────────

/// Metallic hi-hat tone. Decay rates are in 1/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HatRecipe {
    /// Square oscillator frequencies; non-harmonic ratios give the metal.
    pub partials: [f64; 6],
    pub highpass_hz: f64,
    /// White noise mixed under the partials, 0..1.
    pub noise: f64,
    /// Decay rate at closedness 0.
    pub open_decay: f64,
    /// Decay rate at closedness 1.
    pub closed_decay: f64,
}

impl HatRecipe {
    pub const DEFAULT: HatRecipe = HatRecipe {
        partials: [205.3, 304.4, 369.6, 522.7, 540.0, 800.0],
        highpass_hz: 7000.0,
        noise: 0.3,
        open_decay: 12.0,
        closed_decay: 120.0,
    };

    pub fn validate(&self) -> Result<()> {
        for &hz in &self.partials {
            ensure_positive("partials", hz)?;
        }
        ensure_positive("highpass_hz", self.highpass_hz)?;
        ensure_range("noise", self.noise, 0.0, 1.0, "an amount in [0, 1]")?;
        ensure_positive("open_decay", self.open_decay)?;
        if !(self.closed_decay.is_finite() && self.closed_decay >= self.open_decay) {
            return Err(TechnoError::invalid(
                "closed_decay",
                self.closed_decay,
                "a decay rate >= open_decay",
            ));
        }
        Ok(())
    }

    /// Decay rate for `closedness` in `[0, 1]`.
    pub fn decay_rate(&self, closedness: f64) -> f64 {
        self.open_decay + (self.closed_decay - self.open_decay) * closedness
    }
}

impl Default for HatRecipe {
    fn default() -> Self {
        HatRecipe::DEFAULT
    }
}

// ── Effect chain ────────────────────────────────────────────

/// One processor in a mastering chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectStep {
    LowPass { cutoff_hz: f64 },
    HighPass { cutoff_hz: f64 },
    BandPass { low_hz: f64, high_hz: f64 },
    Resonant { center_hz: f64, resonance: f64 },
    FilterSweep { start_hz: f64, end_hz: f64 },
    SoftClip { drive: f64 },
    HardClip { drive: f64 },
    BitCrush { bits: u32 },
    Compress {
        threshold_db: f64,
        ratio: f64,
        attack_ms: f64,
        release_ms: f64,
    },
    Limit { ceiling_db: f64 },
    Delay { delay_ms: f64, feedback: f64, mix: f64 },
    StereoWidth { width: f64 },
    HaasWiden { delay_ms: f64, width: f64 },
    Gain { db: f64 },
}

impl EffectStep {
    /// Run this step. Output containing NaN or infinity is an error.
    pub fn apply(&self, buffer: &AudioBuffer) -> Result<AudioBuffer> {
        let out = self.process(buffer)?;
        if !out.is_finite() {
            return Err(TechnoError::NumericDegenerate {
                what: format!("{} output", self.name()),
            });
        }
        Ok(out)
    }

    fn process(&self, buffer: &AudioBuffer) -> Result<AudioBuffer> {
        match *self {
            EffectStep::LowPass { cutoff_hz } => low_pass(buffer, cutoff_hz),
            EffectStep::HighPass { cutoff_hz } => high_pass(buffer, cutoff_hz),
            EffectStep::BandPass { low_hz, high_hz } => band_pass(buffer, low_hz, high_hz),
            EffectStep::Resonant {
                center_hz,
                resonance,
            } => resonant_filter(buffer, center_hz, resonance),
            EffectStep::FilterSweep { start_hz, end_hz } => filter_sweep(buffer, start_hz, end_hz),
            EffectStep::SoftClip { drive } => soft_clip(buffer, drive),
            EffectStep::HardClip { drive } => hard_clip(buffer, drive),
            EffectStep::BitCrush { bits } => bit_crush(buffer, bits),
            EffectStep::Compress {
                threshold_db,
                ratio,
                attack_ms,
                release_ms,
            } => compress(buffer, threshold_db, ratio, attack_ms, release_ms),
            EffectStep::Limit { ceiling_db } => limit(buffer, ceiling_db),
            EffectStep::Delay {
                delay_ms,
                feedback,
                mix,
            } => delay(buffer, delay_ms, feedback, mix),
            EffectStep::StereoWidth { width } => stereo_width(buffer, width),
            EffectStep::HaasWiden { delay_ms, width } => haas_widen(buffer, delay_ms, width),
            EffectStep::Gain { db } => buffer.gain_db(db),
        }
    }

    /// Check the parameters by running the step over one silent sample.
    pub fn validate(&self) -> Result<()> {
        let probe = AudioBuffer::silent(1, 1, DEFAULT_SAMPLE_RATE)?;
        self.apply(&probe).map(|_| ())
    }

    pub fn name(&self) -> &'static str {
        match self {
            EffectStep::LowPass { .. } => "low_pass",
            EffectStep::HighPass { .. } => "high_pass",
            EffectStep::BandPass { .. } => "band_pass",
            EffectStep::Resonant { .. } => "resonant",
            EffectStep::FilterSweep { .. } => "filter_sweep",
            EffectStep::SoftClip { .. } => "soft_clip",
            EffectStep::HardClip { .. } => "hard_clip",
            EffectStep::BitCrush { .. } => "bit_crush",
            EffectStep::Compress { .. } => "compress",
            EffectStep::Limit { .. } => "limit",
            EffectStep::Delay { .. } => "delay",
            EffectStep::StereoWidth { .. } => "stereo_width",
            EffectStep::HaasWiden { .. } => "haas_widen",
            EffectStep::Gain { .. } => "gain",
        }
    }
}

/// Run `buffer` through `steps` in order.
pub fn apply_chain(buffer: &AudioBuffer, steps: &[EffectStep]) -> Result<AudioBuffer> {
    debug!(steps = steps.len(), frames = buffer.len(), "running effect chain");
    let mut current = buffer.clone();
    for step in steps {
        if matches!(step, EffectStep::Limit { .. }) && current.peak() > 1.0 {
            warn!(peak = current.peak(), "chain clips before limiting");
        }
        current = step.apply(&current)?;
        trace!(step = step.name(), peak = current.peak(), "effect applied");
    }
    Ok(current)
}

// ── Style preset ────────────────────────────────────────────

/// A complete style: tempo, instrument recipes, and master chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePreset {
    pub name: String,
    pub bpm: Tempo,
    #[serde(default)]
    pub kick: KickRecipe,
    #[serde(default)]
    pub bass: BassRecipe,
    #[serde(default)]
    pub hats: HatRecipe,
    #[serde(default)]
    pub master: Vec<EffectStep>,
}

impl StylePreset {
    /// Names accepted by [`StylePreset::builtin`].
    pub const BUILTIN_NAMES: [&'static str; 3] = ["minimal", "industrial", "dub"];

    /// Parse and validate a preset from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let preset: StylePreset = serde_json::from_str(json)?;
        preset.validate()?;
        Ok(preset)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.kick.validate()?;
        self.bass.validate()?;
        self.hats.validate()?;
        for step in &self.master {
            step.validate()?;
        }
        Ok(())
    }

    /// Apply the master chain.
    pub fn master(&self, buffer: &AudioBuffer) -> Result<AudioBuffer> {
        debug!(style = %self.name, "mastering");
        apply_chain(buffer, &self.master)
    }

    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "minimal" => Some(Self::minimal()),
            "industrial" => Some(Self::industrial()),
            "dub" => Some(Self::dub()),
            _ => None,
        }
    }

    /// Clean and sparse: rumble removed, nothing else.
    pub fn minimal() -> Self {
        StylePreset {
            name: "minimal".to_string(),
            bpm: Tempo::from_const(124.0),
            kick: KickRecipe::MINIMAL,
            bass: BassRecipe::DEFAULT,
            hats: HatRecipe::DEFAULT,
            master: vec![EffectStep::HighPass { cutoff_hz: 30.0 }],
        }
    }

    /// Clipped, crushed, and pushed into a limiter.
    pub fn industrial() -> Self {
        StylePreset {
            name: "industrial".to_string(),
            bpm: Tempo::from_const(138.0),
            kick: KickRecipe::INDUSTRIAL,
            bass: BassRecipe::ACID,
            hats: HatRecipe::DEFAULT,
            master: vec![
                EffectStep::HardClip { drive: 0.7 },
                EffectStep::BitCrush { bits: 14 },
                EffectStep::Gain { db: 3.0 },
                EffectStep::Limit { ceiling_db: -0.5 },
            ],
        }
    }

    /// Dark and spacious: filtered with long echoes.
    pub fn dub() -> Self {
        StylePreset {
            name: "dub".to_string(),
            bpm: Tempo::from_const(118.0),
            kick: KickRecipe::MINIMAL,
            bass: BassRecipe::DEFAULT,
            hats: HatRecipe::DEFAULT,
            master: vec![
                EffectStep::LowPass { cutoff_hz: 4000.0 },
                EffectStep::Delay {
                    delay_ms: 500.0,
                    feedback: 0.7,
                    mix: 0.6,
                },
                EffectStep::HighPass { cutoff_hz: 30.0 },
                EffectStep::Limit { ceiling_db: -1.0 },
            ],
        }
    }
}
