//! DSP: synthesis and processing in pure Rust.
//!
//! Generators (`oscillator`, `envelope`, `primitives`) produce sample data;
//! processors take an [`AudioBuffer`](crate::AudioBuffer) and return a new
//! one of the same length.

pub mod analysis;
pub mod compressor;
pub mod delay;
pub mod distortion;
pub mod envelope;
pub mod filter;
pub mod oscillator;
pub mod primitives;
