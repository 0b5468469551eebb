//! Frequency allocation for a techno mix.
//!
//! Seven bands partition 20 Hz to 20 kHz. Each instrument role owns a few of
//! them; the allocation is used for analysis and carving, never enforced.

use serde::{Deserialize, Serialize};

/// A named, half-open frequency range `[low_hz, high_hz)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBand {
    pub name: &'static str,
    pub low_hz: f64,
    pub high_hz: f64,
    /// What usually lives here.
    pub occupant: &'static str,
}

impl FrequencyBand {
    pub fn contains(&self, hz: f64) -> bool {
        hz >= self.low_hz && hz < self.high_hz
    }

    pub fn width(&self) -> f64 {
        self.high_hz - self.low_hz
    }
}

/// The standard band table.
pub struct FrequencyMap;

impl FrequencyMap {
    pub const SUB_BASS: FrequencyBand = FrequencyBand {
        name: "sub",
        low_hz: 20.0,
        high_hz: 60.0,
        occupant: "kick fundamental",
    };
    pub const BASS: FrequencyBand = FrequencyBand {
        name: "bass",
        low_hz: 60.0,
        high_hz: 250.0,
        occupant: "kick body and bassline",
    };
    pub const LOW_MIDS: FrequencyBand = FrequencyBand {
        name: "low_mids",
        low_hz: 250.0,
        high_hz: 500.0,
        occupant: "bass harmonics",
    };
    pub const MIDS: FrequencyBand = FrequencyBand {
        name: "mids",
        low_hz: 500.0,
        high_hz: 2000.0,
        occupant: "synth pads",
    };
    pub const HIGH_MIDS: FrequencyBand = FrequencyBand {
        name: "high_mids",
        low_hz: 2000.0,
        high_hz: 6000.0,
        occupant: "transients",
    };
    pub const HIGHS: FrequencyBand = FrequencyBand {
        name: "highs",
        low_hz: 6000.0,
        high_hz: 12000.0,
        occupant: "hi-hats",
    };
    pub const AIR: FrequencyBand = FrequencyBand {
        name: "air",
        low_hz: 12000.0,
        high_hz: 20000.0,
        occupant: "shimmer",
    };

    /// All bands, ascending.
    pub const BANDS: [FrequencyBand; 7] = [
        Self::SUB_BASS,
        Self::BASS,
        Self::LOW_MIDS,
        Self::MIDS,
        Self::HIGH_MIDS,
        Self::HIGHS,
        Self::AIR,
    ];

    pub fn bands() -> &'static [FrequencyBand] {
        &Self::BANDS
    }

    pub fn band(name: &str) -> Option<&'static FrequencyBand> {
        Self::BANDS.iter().find(|b| b.name == name)
    }

    /// The band containing `hz`, if it is in the audible range.
    pub fn band_for(hz: f64) -> Option<&'static FrequencyBand> {
        Self::BANDS.iter().find(|b| b.contains(hz))
    }

    pub fn allocation(role: InstrumentRole) -> &'static [FrequencyBand] {
        role.allocation()
    }
}

/// Instrument roles that get a band allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentRole {
    Kick,
    Bass,
    Hats,
}

impl InstrumentRole {
    pub fn allocation(self) -> &'static [FrequencyBand] {
        const KICK: [FrequencyBand; 3] = [
            FrequencyMap::SUB_BASS,
            FrequencyMap::BASS,
            FrequencyMap::HIGH_MIDS,
        ];
        const BASS: [FrequencyBand; 2] = [FrequencyMap::BASS, FrequencyMap::LOW_MIDS];
        const HATS: [FrequencyBand; 2] = [FrequencyMap::HIGHS, FrequencyMap::AIR];
        match self {
            InstrumentRole::Kick => &KICK,
            InstrumentRole::Bass => &BASS,
            InstrumentRole::Hats => &HATS,
        }
    }
}
