//! AudioBuffer, the value every primitive produces and every processor returns.

use crate::error::{Result, TechnoError};

/// Sample rate used when a caller does not pick one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// A mono or stereo block of `f64` samples at a fixed sample rate.
///
/// Samples are nominally in `[-1.0, 1.0]`. Buffers are plain values:
/// processors borrow one and hand back a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f64>>,
}

impl AudioBuffer {
    pub fn mono(samples: Vec<f64>, sample_rate: u32) -> Result<Self> {
        check_rate(sample_rate)?;
        Ok(AudioBuffer {
            sample_rate,
            channels: vec![samples],
        })
    }

    pub fn stereo(left: Vec<f64>, right: Vec<f64>, sample_rate: u32) -> Result<Self> {
        check_rate(sample_rate)?;
        if left.len() != right.len() {
            return Err(TechnoError::invalid(
                "right",
                right.len() as f64,
                "a channel the same length as the left channel",
            ));
        }
        Ok(AudioBuffer {
            sample_rate,
            channels: vec![left, right],
        })
    }

    /// `len` samples of silence on `channels` (1 or 2) channels.
    pub fn silent(len: usize, channels: usize, sample_rate: u32) -> Result<Self> {
        check_rate(sample_rate)?;
        if !(1..=2).contains(&channels) {
            return Err(TechnoError::invalid("channels", channels as f64, "1 or 2 channels"));
        }
        Ok(AudioBuffer {
            sample_rate,
            channels: vec![vec![0.0; len]; channels],
        })
    }

    /// Build a buffer shaped like `self` from already-processed channels.
    pub(crate) fn with_channels(&self, channels: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(channels.len(), self.channels.len());
        AudioBuffer {
            sample_rate: self.sample_rate,
            channels,
        }
    }

    /// Apply `f` to every channel, keeping the sample rate.
    pub(crate) fn map_channels<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&[f64]) -> Result<Vec<f64>>,
    {
        let channels = self
            .channels
            .iter()
            .map(|ch| f(ch))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_channels(channels))
    }

    /// Apply `f` to every sample.
    pub(crate) fn map_samples<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        self.with_channels(
            self.channels
                .iter()
                .map(|ch| ch.iter().map(|&s| f(s)).collect())
                .collect(),
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn is_stereo(&self) -> bool {
        self.channels.len() == 2
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_ms(&self) -> f64 {
        self.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f64]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    /// Consume the buffer, returning its channel data.
    pub fn into_channels(self) -> Vec<Vec<f64>> {
        self.channels
    }

    /// Largest absolute sample across all channels.
    pub fn peak(&self) -> f64 {
        self.channels
            .iter()
            .flatten()
            .fold(0.0_f64, |m, &s| m.max(s.abs()))
    }

    /// Mean power across all channels.
    pub fn energy(&self) -> f64 {
        let n = self.len() * self.num_channels();
        if n == 0 {
            return 0.0;
        }
        self.channels.iter().flatten().map(|s| s * s).sum::<f64>() / n as f64
    }

    pub fn is_finite(&self) -> bool {
        self.channels.iter().flatten().all(|s| s.is_finite())
    }

    /// Average the channels down to one.
    pub fn to_mono(&self) -> AudioBuffer {
        if !self.is_stereo() {
            return self.clone();
        }
        let mixed = self.channels[0]
            .iter()
            .zip(&self.channels[1])
            .map(|(l, r)| (l + r) * 0.5)
            .collect();
        AudioBuffer {
            sample_rate: self.sample_rate,
            channels: vec![mixed],
        }
    }

    /// Duplicate a mono buffer onto two channels.
    pub fn to_stereo(&self) -> AudioBuffer {
        if self.is_stereo() {
            return self.clone();
        }
        let ch = self.channels[0].clone();
        AudioBuffer {
            sample_rate: self.sample_rate,
            channels: vec![ch.clone(), ch],
        }
    }

    /// Mix `other` into a copy of `self` starting at frame `at`.
    ///
    /// The result keeps `self`'s length; anything past the end is dropped.
    /// A mono `other` lands on both channels of a stereo `self`.
    pub fn overlay(&self, other: &AudioBuffer, at: usize) -> Result<AudioBuffer> {
        let mut out = self.clone();
        out.mix_in(other, at)?;
        Ok(out)
    }

    /// In-place form of [`AudioBuffer::overlay`].
    pub fn mix_in(&mut self, other: &AudioBuffer, at: usize) -> Result<()> {
        self.check_compatible(other)?;
        for (c, dst) in self.channels.iter_mut().enumerate() {
            let src = &other.channels[c.min(other.channels.len() - 1)];
            for (d, s) in dst.iter_mut().skip(at).zip(src) {
                *d += s;
            }
        }
        Ok(())
    }

    /// Append `other` after `self`.
    pub fn concat(&self, other: &AudioBuffer) -> Result<AudioBuffer> {
        self.check_compatible(other)?;
        let mut out = self.clone();
        for (c, dst) in out.channels.iter_mut().enumerate() {
            let src = &other.channels[c.min(other.channels.len() - 1)];
            dst.extend_from_slice(src);
        }
        Ok(out)
    }

    /// Scale by `db` decibels.
    ///
    /// Fails with `NumericDegenerate` if the gain or any scaled sample
    /// overflows to infinity.
    pub fn gain_db(&self, db: f64) -> Result<AudioBuffer> {
        crate::error::ensure_finite("gain_db", db)?;
        let g = db_to_linear(db);
        let out = self.map_samples(|s| s * g);
        if !g.is_finite() || !out.is_finite() {
            return Err(TechnoError::NumericDegenerate {
                what: format!("gain of {db} dB"),
            });
        }
        Ok(out)
    }

    /// Scale so the peak sits at `target` (linear). Silence is returned as is.
    pub fn normalize(&self, target: f64) -> Result<AudioBuffer> {
        crate::error::ensure_range("target", target, 0.0, 1.0, "a peak in [0, 1]")?;
        let peak = self.peak();
        if peak == 0.0 {
            return Ok(self.clone());
        }
        let g = target / peak;
        Ok(self.map_samples(|s| s * g))
    }

    fn check_compatible(&self, other: &AudioBuffer) -> Result<()> {
        if other.sample_rate != self.sample_rate {
            return Err(TechnoError::invalid(
                "sample_rate",
                other.sample_rate as f64,
                "the same sample rate as the destination buffer",
            ));
        }
        if other.num_channels() > self.num_channels() {
            return Err(TechnoError::invalid(
                "channels",
                other.num_channels() as f64,
                "no more channels than the destination buffer",
            ));
        }
        Ok(())
    }
}

/// Convert decibels to a linear gain factor.
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear amplitude to decibels, flooring silence at -120 dB.
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

fn check_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(TechnoError::invalid("sample_rate", 0.0, "a rate > 0 Hz"));
    }
    Ok(())
}
