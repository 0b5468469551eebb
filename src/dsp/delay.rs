//! Spatial effects: feedback delay line and stereo width.

use crate::buffer::AudioBuffer;
use crate::error::{Result, TechnoError, ensure_non_negative, ensure_positive, ensure_range};

/// Level of the delayed copy on the right channel in [`haas_widen`].
const HAAS_LEVEL: f64 = 0.8;

/// A mono delay line with feedback and dry/wet mix.
///
/// The ring buffer holds exactly one delay period, so each echo arrives
/// `delay_samples` after the previous one scaled by `feedback`.
#[derive(Debug, Clone)]
pub struct Delay {
    buffer: Vec<f64>,
    write_pos: usize,

    /// Feedback amount, `[0, 1)`.
    pub feedback: f64,
    /// Dry/wet mix (0.0 = fully dry, 1.0 = fully wet).
    pub mix: f64,
}

impl Delay {
    pub fn new(delay_samples: usize, feedback: f64, mix: f64) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback,
            mix,
        }
    }

    /// Process one sample, returning the mixed output.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let delayed = self.buffer[self.write_pos];
        self.buffer[self.write_pos] = input + delayed * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        input * (1.0 - self.mix) + delayed * self.mix
    }
}

/// Feedback echo. `feedback` must stay below 1 or the echoes would grow.
///
/// The output keeps the input length; echoes past the end are cut.
pub fn delay(buffer: &AudioBuffer, delay_ms: f64, feedback: f64, mix: f64) -> Result<AudioBuffer> {
    ensure_positive("delay_ms", delay_ms)?;
    if !(feedback.is_finite() && (0.0..1.0).contains(&feedback)) {
        return Err(TechnoError::invalid("feedback", feedback, "a feedback in [0, 1)"));
    }
    ensure_range("mix", mix, 0.0, 1.0, "a mix in [0, 1]")?;

    let delay_samples = (delay_ms * buffer.sample_rate() as f64 / 1000.0).round() as usize;
    if delay_samples == 0 {
        return Err(TechnoError::invalid(
            "delay_ms",
            delay_ms,
            "a delay of at least one sample",
        ));
    }

    buffer.map_channels(|ch| {
        let mut line = Delay::new(delay_samples, feedback, mix);
        Ok(ch.iter().map(|&s| line.process(s)).collect())
    })
}

/// Mid/side width. 1.0 leaves the image alone, 0.0 collapses to mono.
///
/// A mono buffer has no side signal, so it comes back unchanged; use
/// [`haas_widen`] to give it one first.
pub fn stereo_width(buffer: &AudioBuffer, width: f64) -> Result<AudioBuffer> {
    ensure_non_negative("width", width)?;
    if !buffer.is_stereo() {
        return Ok(buffer.clone());
    }
    let (left, right) = (&buffer.channels()[0], &buffer.channels()[1]);
    let mut out_l = Vec::with_capacity(left.len());
    let mut out_r = Vec::with_capacity(right.len());
    for (&l, &r) in left.iter().zip(right) {
        let mid = (l + r) / 2.0;
        let side = (l - r) / 2.0 * width;
        out_l.push(mid + side);
        out_r.push(mid - side);
    }
    Ok(buffer.with_channels(vec![out_l, out_r]))
}

/// Pseudo-stereo from mono: the right channel is a short, quieter delayed
/// copy (Haas effect), then the image is scaled by `width`.
pub fn haas_widen(buffer: &AudioBuffer, delay_ms: f64, width: f64) -> Result<AudioBuffer> {
    ensure_range("delay_ms", delay_ms, 0.0, 40.0, "a Haas delay in [0, 40] ms")?;
    ensure_non_negative("width", width)?;
    let mono = buffer.to_mono();
    let src = &mono.channels()[0];
    let offset = (delay_ms * buffer.sample_rate() as f64 / 1000.0).round() as usize;
    let right = (0..src.len())
        .map(|i| if i >= offset { src[i - offset] * HAAS_LEVEL } else { 0.0 })
        .collect();
    let stereo = AudioBuffer::stereo(src.clone(), right, buffer.sample_rate())?;
    stereo_width(&stereo, width)
}
