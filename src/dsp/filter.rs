//! Biquad filters and the buffer-level filtering operations built on them.

use std::f64::consts::PI;

use tracing::trace;

use crate::buffer::AudioBuffer;
use crate::error::{Result, TechnoError, ensure_positive, ensure_range};

/// Butterworth Q for a single second-order section.
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Section Qs of a 4th-order Butterworth response.
const BUTTERWORTH_4TH_Q: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_376_5];

/// Q reached at full resonance.
const MAX_RESONANT_Q: f64 = 20.0;

/// Samples between coefficient updates in a sweep.
const SWEEP_BLOCK: usize = 64;

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    Lowpass,
    Highpass,
}

/// Normalized biquad coefficients (a0 = 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Coefficients {
    /// Audio EQ Cookbook (Robert Bristow-Johnson) coefficients.
    ///
    /// Fails with `NumericDegenerate` if the result is non-finite or the
    /// poles fall outside the unit circle.
    pub fn design(filter_type: FilterType, frequency: f64, q: f64, sample_rate: f64) -> Result<Self> {
        let w0 = 2.0 * PI * frequency / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let (b0, b1, b2) = match filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
        };
        let a0 = 1.0 + alpha;
        let coeffs = Coefficients {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        };
        trace!(?filter_type, frequency, q, ?coeffs, "biquad designed");

        let finite = [coeffs.b0, coeffs.b1, coeffs.b2, coeffs.a1, coeffs.a2]
            .iter()
            .all(|c| c.is_finite());
        let stable = coeffs.a2.abs() < 1.0 && coeffs.a1.abs() < 1.0 + coeffs.a2;
        if !finite || !stable {
            return Err(TechnoError::NumericDegenerate {
                what: format!("{filter_type:?} biquad at {frequency} Hz, Q {q}"),
            });
        }
        Ok(coeffs)
    }
}

/// A biquad IIR filter (2nd order).
///
/// Implements the standard Direct Form II Transposed structure.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: Coefficients,
    z1: f64,
    z2: f64,
}

impl BiquadFilter {
    pub fn new(coeffs: Coefficients) -> Self {
        BiquadFilter {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn design(filter_type: FilterType, frequency: f64, q: f64, sample_rate: f64) -> Result<Self> {
        Ok(Self::new(Coefficients::design(filter_type, frequency, q, sample_rate)?))
    }

    /// Swap coefficients without clearing state (for sweeps).
    pub fn set_coefficients(&mut self, coeffs: Coefficients) {
        self.coeffs = coeffs;
    }

    /// Process a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }

    pub fn process_slice(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&s| self.process(s)).collect()
    }
}

/// Remove content above `cutoff_hz` (4th-order Butterworth).
pub fn low_pass(buffer: &AudioBuffer, cutoff_hz: f64) -> Result<AudioBuffer> {
    let sr = check_frequency(buffer, "cutoff_hz", cutoff_hz)?;
    butterworth(buffer, FilterType::Lowpass, cutoff_hz, sr)
}

/// Remove content below `cutoff_hz` (4th-order Butterworth).
pub fn high_pass(buffer: &AudioBuffer, cutoff_hz: f64) -> Result<AudioBuffer> {
    let sr = check_frequency(buffer, "cutoff_hz", cutoff_hz)?;
    butterworth(buffer, FilterType::Highpass, cutoff_hz, sr)
}

/// Keep `low_hz..high_hz`: a high-pass at the lower edge into a low-pass at the upper.
pub fn band_pass(buffer: &AudioBuffer, low_hz: f64, high_hz: f64) -> Result<AudioBuffer> {
    let sr = check_frequency(buffer, "low_hz", low_hz)?;
    check_frequency(buffer, "high_hz", high_hz)?;
    if low_hz >= high_hz {
        return Err(TechnoError::invalid("low_hz", low_hz, "a lower edge below high_hz"));
    }
    let highs_removed = butterworth(buffer, FilterType::Highpass, low_hz, sr)?;
    butterworth(&highs_removed, FilterType::Lowpass, high_hz, sr)
}

/// Resonant low-pass. `resonance` in `[0, 1]` maps linearly onto Q 0.707..20.
pub fn resonant_filter(buffer: &AudioBuffer, center_hz: f64, resonance: f64) -> Result<AudioBuffer> {
    let sr = check_frequency(buffer, "center_hz", center_hz)?;
    ensure_range("resonance", resonance, 0.0, 1.0, "a resonance in [0, 1]")?;
    let q = resonance_to_q(resonance);
    let coeffs = Coefficients::design(FilterType::Lowpass, center_hz, q, sr)?;
    buffer.map_channels(|ch| Ok(BiquadFilter::new(coeffs).process_slice(ch)))
}

pub fn resonance_to_q(resonance: f64) -> f64 {
    BUTTERWORTH_Q + resonance * (MAX_RESONANT_Q - BUTTERWORTH_Q)
}

/// Low-pass whose cutoff glides from `start_hz` to `end_hz` across the buffer.
///
/// The cutoff moves exponentially (equal musical steps) and is recomputed
/// every 64 samples.
pub fn filter_sweep(buffer: &AudioBuffer, start_hz: f64, end_hz: f64) -> Result<AudioBuffer> {
    let sr = check_frequency(buffer, "start_hz", start_hz)?;
    check_frequency(buffer, "end_hz", end_hz)?;
    let len = buffer.len();
    let blocks = len.div_ceil(SWEEP_BLOCK).max(1);
    let ratio = end_hz / start_hz;
    let schedule = (0..blocks)
        .map(|b| {
            let progress = if blocks > 1 {
                b as f64 / (blocks - 1) as f64
            } else {
                1.0
            };
            Coefficients::design(
                FilterType::Lowpass,
                start_hz * ratio.powf(progress),
                BUTTERWORTH_Q,
                sr,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    buffer.map_channels(|ch| {
        let mut filter = BiquadFilter::new(schedule[0]);
        let mut out = Vec::with_capacity(ch.len());
        for (block, chunk) in ch.chunks(SWEEP_BLOCK).enumerate() {
            filter.set_coefficients(schedule[block]);
            out.extend(chunk.iter().map(|&s| filter.process(s)));
        }
        Ok(out)
    })
}

fn butterworth(buffer: &AudioBuffer, filter_type: FilterType, freq: f64, sr: f64) -> Result<AudioBuffer> {
    let sections = BUTTERWORTH_4TH_Q
        .iter()
        .map(|&q| Coefficients::design(filter_type, freq, q, sr))
        .collect::<Result<Vec<_>>>()?;
    buffer.map_channels(|ch| {
        let mut out = ch.to_vec();
        for &coeffs in &sections {
            out = BiquadFilter::new(coeffs).process_slice(&out);
        }
        Ok(out)
    })
}

/// Validate a filter frequency against the buffer's Nyquist limit.
fn check_frequency(buffer: &AudioBuffer, name: &'static str, hz: f64) -> Result<f64> {
    ensure_positive(name, hz)?;
    let sr = buffer.sample_rate() as f64;
    if hz >= sr / 2.0 {
        return Err(TechnoError::invalid(name, hz, "a frequency below Nyquist"));
    }
    Ok(sr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::WaveformGenerator;

    fn tone(freq: f64) -> AudioBuffer {
        AudioBuffer::mono(WaveformGenerator::sine(freq, 0.5, 44100).unwrap(), 44100).unwrap()
    }

    /// Peak after the filter transient has settled.
    fn settled_peak(buf: &AudioBuffer) -> f64 {
        buf.channel(0).unwrap()[4410..]
            .iter()
            .fold(0.0_f64, |m, &s| m.max(s.abs()))
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::design(FilterType::Lowpass, 5000.0, BUTTERWORTH_Q, 44100.0).unwrap();
        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.001, "Lowpass should pass DC, got {output}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = BiquadFilter::design(FilterType::Highpass, 1000.0, BUTTERWORTH_Q, 44100.0).unwrap();
        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!(output.abs() < 0.001, "Highpass should block DC, got {output}");
    }

    #[test]
    fn low_pass_attenuates_above_cutoff() {
        let out = low_pass(&tone(5000.0), 500.0).unwrap();
        let gain_db = 20.0 * settled_peak(&out).log10();
        assert!(gain_db < -6.0, "5 kHz through a 500 Hz low-pass only dropped {gain_db:.1} dB");
    }

    #[test]
    fn low_pass_keeps_tone_below_cutoff() {
        let out = low_pass(&tone(100.0), 2000.0).unwrap();
        let peak = settled_peak(&out);
        assert!((peak - 1.0).abs() < 0.02, "100 Hz should pass a 2 kHz low-pass, got {peak}");
    }

    #[test]
    fn high_pass_attenuates_below_cutoff() {
        let out = high_pass(&tone(100.0), 2000.0).unwrap();
        assert!(settled_peak(&out) < 0.01);
        let out = high_pass(&tone(8000.0), 2000.0).unwrap();
        assert!((settled_peak(&out) - 1.0).abs() < 0.02);
    }

    #[test]
    fn band_pass_keeps_middle() {
        let inside = band_pass(&tone(1000.0), 300.0, 3000.0).unwrap();
        let below = band_pass(&tone(50.0), 300.0, 3000.0).unwrap();
        let above = band_pass(&tone(15000.0), 300.0, 3000.0).unwrap();
        let p_in = settled_peak(&inside);
        assert!(p_in > 0.9, "In-band tone should pass, got {p_in}");
        assert!(settled_peak(&below) < 0.1);
        assert!(settled_peak(&above) < 0.1);
    }

    #[test]
    fn resonance_boosts_cutoff() {
        let flat = resonant_filter(&tone(1000.0), 1000.0, 0.0).unwrap();
        let peaky = resonant_filter(&tone(1000.0), 1000.0, 0.5).unwrap();
        assert!(settled_peak(&peaky) > 2.0 * settled_peak(&flat));
        assert!((resonance_to_q(1.0) - MAX_RESONANT_Q).abs() < 1e-12);
    }

    #[test]
    fn frequency_validation() {
        let buf = tone(440.0);
        assert!(low_pass(&buf, 0.0).is_err());
        assert!(low_pass(&buf, 22050.0).is_err(), "Nyquist itself is rejected");
        assert!(high_pass(&buf, -10.0).is_err());
        assert!(band_pass(&buf, 3000.0, 300.0).is_err());
        assert!(band_pass(&buf, 300.0, 300.0).is_err());
        assert!(resonant_filter(&buf, 1000.0, 1.5).is_err());
    }

    #[test]
    fn degenerate_q_rejected() {
        assert!(matches!(
            Coefficients::design(FilterType::Lowpass, 1000.0, 0.0, 44100.0),
            Err(TechnoError::NumericDegenerate { .. })
        ));
    }

    #[test]
    fn sweep_opens_up() {
        let buf = tone(3000.0);
        let out = filter_sweep(&buf, 200.0, 10000.0).unwrap();
        assert_eq!(out.len(), buf.len());
        let ch = out.channel(0).unwrap();
        let early = ch[2000..4000].iter().fold(0.0_f64, |m, &s| m.max(s.abs()));
        let late = ch[20000..22000].iter().fold(0.0_f64, |m, &s| m.max(s.abs()));
        assert!(late > 2.0 * early, "Sweep should open: early {early}, late {late}");
        assert!(out.is_finite());
    }

    #[test]
    fn filters_preserve_shape() {
        let st = tone(440.0).to_stereo();
        let out = low_pass(&st, 1000.0).unwrap();
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.len(), st.len());
    }
}
