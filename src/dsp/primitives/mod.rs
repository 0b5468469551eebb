//! Synthesized instruments: every hit and note is built from oscillators,
//! envelopes and filters at render time.

pub mod bass;
pub mod hihat;
pub mod kick;

pub use bass::Bass;
pub use hihat::HiHat;
pub use kick::Kick;

/// Seed for the noise layers when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x7EC4_0000;

/// Convert a MIDI note number to frequency (A4 = 69 = 440 Hz).
///
/// Formula: `440 * 2^((midi - 69) / 12)`
pub fn midi_to_frequency(midi: i32) -> f64 {
    440.0 * (2.0_f64).powf((midi as f64 - 69.0) / 12.0)
}

/// Scale `samples` in place so the largest magnitude equals `target`.
pub(crate) fn normalize_peak(samples: &mut [f64], target: f64) {
    let peak = samples.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        let g = target / peak;
        samples.iter_mut().for_each(|s| *s *= g);
    }
}
