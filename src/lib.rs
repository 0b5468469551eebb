//! Procedural techno synthesis.
//!
//! Kicks, basslines and hi-hats are synthesized from oscillators and
//! envelopes, placed on a BPM grid, and shaped by filters, distortion,
//! dynamics and spatial effects. Nothing is sampled.
//!
//! ```no_run
//! use techno_core::{Kick, StylePreset};
//!
//! let kick = Kick::new(130.0)?.generate_industrial()?;
//! let mastered = StylePreset::industrial().master(&kick)?;
//! let wav = techno_core::export::encode_wav(&mastered)?;
//! # Ok::<(), techno_core::TechnoError>(())
//! ```

pub mod buffer;
pub mod dsp;
pub mod error;
pub mod export;
pub mod frequency;
pub mod preset;
pub mod timing;

pub use buffer::{AudioBuffer, DEFAULT_SAMPLE_RATE, db_to_linear, linear_to_db};
pub use dsp::analysis::{FrequencyReport, analyze_frequency_content, carve_for_role};
pub use dsp::compressor::{compress, limit};
pub use dsp::delay::{delay, haas_widen, stereo_width};
pub use dsp::distortion::{bit_crush, hard_clip, soft_clip};
pub use dsp::envelope::{Envelope, EnvelopeGenerator};
pub use dsp::filter::{band_pass, filter_sweep, high_pass, low_pass, resonant_filter};
pub use dsp::oscillator::{Waveform, WaveformGenerator};
pub use dsp::primitives::{Bass, HiHat, Kick};
pub use error::{Result, TechnoError};
pub use frequency::{FrequencyBand, FrequencyMap, InstrumentRole};
pub use preset::{BassPattern, BassRecipe, BassStep, EffectStep, HatRecipe, KickRecipe, KickStyle, StylePreset};
pub use timing::{MusicalTime, Tempo, TimingCalculator};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
