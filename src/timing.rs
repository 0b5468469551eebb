//! Musical timing: bars, beats, and 16ths converted to milliseconds and samples.
//!
//! Everything downstream (drum placement, bass patterns, effect delay times)
//! derives its positions from a [`TimingCalculator`]. The meter is fixed at 4/4.

use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_SAMPLE_RATE;
use crate::error::{Result, TechnoError};

/// Slowest tempo accepted, in BPM.
pub const MIN_BPM: f64 = 40.0;
/// Fastest tempo accepted, in BPM.
pub const MAX_BPM: f64 = 300.0;
/// Beats per bar (4/4 meter).
pub const BEATS_PER_BAR: f64 = 4.0;

/// Largest grid whose offsets still fit in one allocation.
const MAX_GRID_POINTS: i64 = isize::MAX as i64 / 8;

/// A validated tempo in beats per minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tempo(f64);

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self> {
        if bpm.is_finite() && (MIN_BPM..=MAX_BPM).contains(&bpm) {
            Ok(Tempo(bpm))
        } else {
            Err(TechnoError::InvalidTempo {
                bpm,
                min: MIN_BPM,
                max: MAX_BPM,
            })
        }
    }

    /// For tempos known at compile time to be in range.
    pub(crate) const fn from_const(bpm: f64) -> Self {
        Tempo(bpm)
    }

    pub fn bpm(self) -> f64 {
        self.0
    }

    pub fn ms_per_beat(self) -> f64 {
        60_000.0 / self.0
    }

    pub fn ms_per_bar(self) -> f64 {
        self.ms_per_beat() * BEATS_PER_BAR
    }

    pub fn ms_per_16th(self) -> f64 {
        self.ms_per_bar() / 16.0
    }
}

impl TryFrom<f64> for Tempo {
    type Error = TechnoError;

    fn try_from(bpm: f64) -> Result<Self> {
        Tempo::new(bpm)
    }
}

impl From<Tempo> for f64 {
    fn from(tempo: Tempo) -> f64 {
        tempo.0
    }
}

/// A position expressed as bars + beats + 16ths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicalTime {
    bars: u32,
    beats: u32,
    sixteenths: u32,
}

impl MusicalTime {
    /// `beats` must be in `0..4`, `sixteenths` in `0..=4`.
    pub fn new(bars: i64, beats: i64, sixteenths: i64) -> Result<Self> {
        if bars < 0 || bars > u32::MAX as i64 {
            return Err(TechnoError::invalid("bars", bars as f64, "a bar count >= 0"));
        }
        if !(0..4).contains(&beats) {
            return Err(TechnoError::invalid("beats", beats as f64, "a beat in 0..4"));
        }
        if !(0..=4).contains(&sixteenths) {
            return Err(TechnoError::invalid(
                "sixteenths",
                sixteenths as f64,
                "a sixteenth in 0..=4",
            ));
        }
        Ok(MusicalTime {
            bars: bars as u32,
            beats: beats as u32,
            sixteenths: sixteenths as u32,
        })
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    pub fn beats(&self) -> u32 {
        self.beats
    }

    pub fn sixteenths(&self) -> u32 {
        self.sixteenths
    }

    /// Total position in beats.
    pub fn to_beats(&self) -> f64 {
        self.bars as f64 * BEATS_PER_BAR + self.beats as f64 + self.sixteenths as f64 / 4.0
    }

    /// Position in whole milliseconds (truncated).
    pub fn to_ms(&self, tempo: Tempo) -> i64 {
        (self.to_beats() * tempo.ms_per_beat()) as i64
    }
}

/// Converts between musical positions and absolute time for one tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingCalculator {
    tempo: Tempo,
    sample_rate: u32,
}

impl TimingCalculator {
    /// Create a calculator at the default sample rate.
    pub fn new(bpm: f64) -> Result<Self> {
        Ok(TimingCalculator {
            tempo: Tempo::new(bpm)?,
            sample_rate: DEFAULT_SAMPLE_RATE,
        })
    }

    pub fn from_tempo(tempo: Tempo) -> Self {
        TimingCalculator {
            tempo,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Use `sample_rate` for the sample-domain conversions.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(TechnoError::invalid("sample_rate", 0.0, "a rate > 0 Hz"));
        }
        self.sample_rate = sample_rate;
        Ok(self)
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn ms_per_beat(&self) -> f64 {
        self.tempo.ms_per_beat()
    }

    pub fn ms_per_bar(&self) -> f64 {
        self.tempo.ms_per_bar()
    }

    pub fn ms_per_16th(&self) -> f64 {
        self.tempo.ms_per_16th()
    }

    pub fn bars_to_ms(&self, bars: f64) -> f64 {
        bars * self.ms_per_bar()
    }

    pub fn ms_to_bars(&self, ms: f64) -> f64 {
        ms / self.ms_per_bar()
    }

    /// Snap `ms` to the nearest whole bar, returned in whole milliseconds.
    ///
    /// Ties round up: exactly half a bar snaps forward to the next bar line.
    pub fn nearest_bar(&self, ms: f64) -> i64 {
        snap(ms, self.ms_per_bar())
    }

    /// Snap `ms` to the nearest beat, ties rounding up.
    pub fn nearest_beat(&self, ms: f64) -> i64 {
        snap(ms, self.ms_per_beat())
    }

    /// Millisecond offsets of every subdivision in `total_bars` bars.
    ///
    /// Each offset is rounded from its exact position rather than accumulated
    /// step by step, so the error stays within half a millisecond on any
    /// grid length.
    ///
    /// Besides a non-positive `subdivision` or negative `total_bars`, a
    /// subdivision finer than 1 ms per step is rejected, since neighbouring
    /// offsets would collapse onto the same millisecond.
    pub fn create_grid(&self, total_bars: i64, subdivision: i64) -> Result<Vec<i64>> {
        let (step, count) = self.grid_step(total_bars, subdivision)?;
        if step < 1.0 {
            return Err(TechnoError::invalid(
                "subdivision",
                subdivision as f64,
                "a subdivision no finer than 1 ms per step",
            ));
        }
        let ms_per_bar = self.ms_per_bar();
        let subdivision = subdivision as f64;
        Ok((0..count)
            .map(|i| (i as f64 * ms_per_bar / subdivision).round() as i64)
            .collect())
    }

    /// Sample offsets of every subdivision, rounded from the exact position.
    pub fn create_sample_grid(&self, total_bars: i64, subdivision: i64) -> Result<Vec<usize>> {
        let (_, count) = self.grid_step(total_bars, subdivision)?;
        let samples_per_bar = self.samples_per_bar();
        let subdivision = subdivision as f64;
        Ok((0..count)
            .map(|i| (i as f64 * samples_per_bar / subdivision).round() as usize)
            .collect())
    }

    /// Exact (fractional) samples in one beat.
    pub fn samples_per_beat(&self) -> f64 {
        self.ms_per_beat() * self.sample_rate as f64 / 1000.0
    }

    /// Exact (fractional) samples in one bar.
    pub fn samples_per_bar(&self) -> f64 {
        self.samples_per_beat() * BEATS_PER_BAR
    }

    pub fn ms_to_samples(&self, ms: f64) -> usize {
        (ms.max(0.0) * self.sample_rate as f64 / 1000.0).round() as usize
    }

    pub fn beats_to_samples(&self, beats: f64) -> usize {
        (beats.max(0.0) * self.samples_per_beat()).round() as usize
    }

    pub fn bars_to_samples(&self, bars: f64) -> usize {
        (bars.max(0.0) * self.samples_per_bar()).round() as usize
    }

    /// Step length in ms and number of grid points.
    fn grid_step(&self, total_bars: i64, subdivision: i64) -> Result<(f64, usize)> {
        if subdivision <= 0 {
            return Err(TechnoError::invalid(
                "subdivision",
                subdivision as f64,
                "a subdivision > 0",
            ));
        }
        if total_bars < 0 {
            return Err(TechnoError::invalid(
                "total_bars",
                total_bars as f64,
                "a bar count >= 0",
            ));
        }
        let count = total_bars
            .checked_mul(subdivision)
            .filter(|&n| n <= MAX_GRID_POINTS)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                TechnoError::invalid(
                    "total_bars",
                    total_bars as f64,
                    "a bar count whose grid fits in addressable memory",
                )
            })?;
        Ok((self.ms_per_bar() / subdivision as f64, count))
    }
}

fn snap(ms: f64, unit: f64) -> i64 {
    let units = (ms / unit + 0.5).floor();
    (units * unit).round() as i64
}
