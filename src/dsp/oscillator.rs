//! Naive periodic oscillators.
//!
//! Primitives here run at bass and drum frequencies, so the waveforms are not
//! band-limited; aliasing of the upper sawtooth/square partials is accepted.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TechnoError, ensure_positive};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Value of the waveform at `phase` in `[0, 1)`.
    #[inline]
    pub fn at(self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            // Rises from -1 to +1, then drops.
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            // -1 -> +1 over the first half, +1 -> -1 over the second.
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
        }
    }
}

/// A phase-accumulating oscillator whose frequency may change every sample.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Generate the next sample at the current frequency.
    pub fn next_sample(&mut self) -> f64 {
        let sample = self.waveform.at(self.phase);
        self.phase += self.frequency / self.sample_rate;
        self.phase -= self.phase.floor();
        sample
    }
}

/// Fixed-frequency waveform rendering.
pub struct WaveformGenerator;

impl WaveformGenerator {
    pub fn sine(frequency: f64, duration: f64, sample_rate: u32) -> Result<Vec<f64>> {
        let n = sample_count(frequency, duration, sample_rate)?;
        let sr = sample_rate as f64;
        Ok((0..n)
            .map(|i| (2.0 * PI * frequency * i as f64 / sr).sin())
            .collect())
    }

    pub fn sawtooth(frequency: f64, duration: f64, sample_rate: u32) -> Result<Vec<f64>> {
        Self::generate(Waveform::Sawtooth, frequency, duration, sample_rate)
    }

    pub fn square(frequency: f64, duration: f64, sample_rate: u32) -> Result<Vec<f64>> {
        Self::generate(Waveform::Square, frequency, duration, sample_rate)
    }

    pub fn triangle(frequency: f64, duration: f64, sample_rate: u32) -> Result<Vec<f64>> {
        Self::generate(Waveform::Triangle, frequency, duration, sample_rate)
    }

    /// `floor(duration * sample_rate)` samples of `waveform`.
    ///
    /// A non-positive `duration` yields an empty vector.
    pub fn generate(
        waveform: Waveform,
        frequency: f64,
        duration: f64,
        sample_rate: u32,
    ) -> Result<Vec<f64>> {
        if waveform == Waveform::Sine {
            return Self::sine(frequency, duration, sample_rate);
        }
        let n = sample_count(frequency, duration, sample_rate)?;
        let cycles_per_sample = frequency / sample_rate as f64;
        Ok((0..n)
            .map(|i| {
                let pos = i as f64 * cycles_per_sample;
                waveform.at(pos - pos.floor())
            })
            .collect())
    }
}

fn sample_count(frequency: f64, duration: f64, sample_rate: u32) -> Result<usize> {
    ensure_positive("frequency", frequency)?;
    if sample_rate == 0 {
        return Err(TechnoError::invalid("sample_rate", 0.0, "a rate > 0 Hz"));
    }
    if duration.is_nan() {
        return Err(TechnoError::invalid("duration", duration, "a finite duration"));
    }
    if duration <= 0.0 {
        return Ok(0);
    }
    if !duration.is_finite() {
        return Err(TechnoError::invalid("duration", duration, "a finite duration"));
    }
    Ok((duration * sample_rate as f64) as usize)
}
