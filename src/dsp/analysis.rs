//! Spectral analysis against the band table, and per-role frequency carving.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use tracing::trace;

use crate::buffer::AudioBuffer;
use crate::dsp::filter::high_pass;
use crate::error::Result;
use crate::frequency::{FrequencyBand, FrequencyMap, InstrumentRole};

/// Bass is kept off the kick fundamental below this.
pub const BASS_CARVE_HZ: f64 = 80.0;

/// Share of in-band spectral power per band, in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyReport {
    shares: Vec<(FrequencyBand, f64)>,
}

impl FrequencyReport {
    fn silent() -> Self {
        FrequencyReport {
            shares: FrequencyMap::BANDS.iter().map(|&b| (b, 0.0)).collect(),
        }
    }

    /// Percentage for the band called `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.shares
            .iter()
            .find(|(b, _)| b.name == name)
            .map(|&(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FrequencyBand, f64)> {
        self.shares.iter().map(|(b, p)| (b, *p))
    }

    /// 100 for any signal with audible content, 0 for silence.
    pub fn total(&self) -> f64 {
        self.shares.iter().map(|&(_, p)| p).sum()
    }

    /// The band holding the most power, `None` for silence.
    pub fn dominant(&self) -> Option<&FrequencyBand> {
        self.shares
            .iter()
            .filter(|(_, p)| *p > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(b, _)| b)
    }
}

/// Power spectrum of the mono mixdown, summed per band and normalized to 100.
///
/// Bins are assigned with `low <= f < high`; anything outside 20 Hz..20 kHz
/// (DC included) is ignored. Input with no in-band content reports 0
/// everywhere: silence, empty buffers, and signals that lie entirely below
/// 20 Hz or above 20 kHz alike.
pub fn analyze_frequency_content(buffer: &AudioBuffer) -> FrequencyReport {
    let mono = buffer.to_mono();
    let samples = match mono.channel(0) {
        Some(s) if !s.is_empty() => s,
        _ => return FrequencyReport::silent(),
    };
    let n = samples.len();

    let mut spectrum: Vec<Complex<f64>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let bin_hz = buffer.sample_rate() as f64 / n as f64;
    let mut power = [0.0_f64; FrequencyMap::BANDS.len()];
    let mut all = 0.0;
    for (k, bin) in spectrum.iter().take(n / 2 + 1).enumerate() {
        let p = bin.norm_sqr();
        all += p;
        if let Some(idx) = FrequencyMap::BANDS
            .iter()
            .position(|b| b.contains(k as f64 * bin_hz))
        {
            power[idx] += p;
        }
    }

    let in_band: f64 = power.iter().sum();
    // Pure DC or rounding noise has nothing meaningful to report.
    if in_band <= 0.0 || in_band < all * 1e-12 {
        return FrequencyReport::silent();
    }
    trace!(n, bin_hz, in_band, "spectrum analyzed");

    FrequencyReport {
        shares: FrequencyMap::BANDS
            .iter()
            .zip(power)
            .map(|(&b, p)| (b, p / in_band * 100.0))
            .collect(),
    }
}

/// Clear space for other roles: bass is high-passed at 80 Hz so the kick
/// fundamental has the sub band to itself. Other roles pass through.
pub fn carve_for_role(buffer: &AudioBuffer, role: InstrumentRole) -> Result<AudioBuffer> {
    match role {
        InstrumentRole::Bass => high_pass(buffer, BASS_CARVE_HZ),
        InstrumentRole::Kick | InstrumentRole::Hats => Ok(buffer.clone()),
    }
}
