//! Waveshaping and bit reduction.

use crate::buffer::AudioBuffer;
use crate::error::{Result, TechnoError, ensure_range};

/// Pre-gain added per unit of drive before the saturation curve.
const DRIVE_GAIN: f64 = 10.0;

/// How far the hard-clip threshold falls at full drive.
const HARD_CLIP_RANGE: f64 = 0.8;

/// Soft clipper using tanh to prevent harsh digital clipping.
#[inline]
pub fn saturate(x: f64, drive: f64) -> f64 {
    ((1.0 + drive * DRIVE_GAIN) * x).tanh()
}

/// Smooth saturation: `tanh((1 + 10 * drive) * x)`. `drive` in `[0, 1]`.
pub fn soft_clip(buffer: &AudioBuffer, drive: f64) -> Result<AudioBuffer> {
    ensure_range("drive", drive, 0.0, 1.0, "a drive in [0, 1]")?;
    Ok(buffer.map_samples(|s| saturate(s, drive)))
}

/// Clamp to `1 - 0.8 * drive`, so drive 0 leaves full-scale audio untouched.
pub fn hard_clip(buffer: &AudioBuffer, drive: f64) -> Result<AudioBuffer> {
    ensure_range("drive", drive, 0.0, 1.0, "a drive in [0, 1]")?;
    let threshold = hard_clip_threshold(drive);
    Ok(buffer.map_samples(|s| s.clamp(-threshold, threshold)))
}

pub fn hard_clip_threshold(drive: f64) -> f64 {
    1.0 - HARD_CLIP_RANGE * drive
}

/// Quantize onto `2^bit_depth` levels with a step of `2^(1 - bit_depth)`.
///
/// Mid-tread quantizer: zero is a level, so silence stays silent. Indices
/// run from `-2^(b-1)` to `2^(b-1) - 1`, which leaves one bit with the two
/// levels `-1` and `0`.
pub fn bit_crush(buffer: &AudioBuffer, bit_depth: u32) -> Result<AudioBuffer> {
    if !(1..=16).contains(&bit_depth) {
        return Err(TechnoError::invalid(
            "bit_depth",
            bit_depth as f64,
            "a bit depth in 1..=16",
        ));
    }
    let half = (1u32 << (bit_depth - 1)) as f64;
    Ok(buffer.map_samples(|s| {
        let index = (s * half).round().clamp(-half, half - 1.0);
        // Adding 0.0 folds -0.0 into 0.0.
        index / half + 0.0
    }))
}
