// 🏅 Placement Scorer - turns a race placement into season points
//
// Fixed curve:
//   1st = 200, 2nd = 190, 3rd = 182, 4th = 176, 5th = 172
//   6th onward = 176 - place (so 6th = 170, ..., 175th = 1)
//   beyond 175th, DISK and MS = 0

use crate::error::{Result, SeasonError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel for a disqualified / not classified runner
pub const DISQUALIFIED: &str = "DISK";

/// Sentinel for a runner who did not start
pub const MISSING_START: &str = "MS";

/// Last place that still scores
pub const LAST_SCORING_PLACE: u32 = 175;

// ============================================================================
// PLACEMENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Ordinal place, 1-based
    Ranked(u32),

    /// "DISK"
    Disqualified,

    /// "MS"
    MissingStart,
}

impl Placement {
    /// Parse a placement as written in results ("12.", "DISK", "MS").
    /// Blank input means the runner was not classified.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed == DISQUALIFIED {
            return Ok(Placement::Disqualified);
        }
        if trimmed == MISSING_START {
            return Ok(Placement::MissingStart);
        }

        let number = trimmed.strip_suffix('.').unwrap_or(trimmed);
        match number.parse::<u32>() {
            Ok(place) if place >= 1 => Ok(Placement::Ranked(place)),
            _ => Err(SeasonError::InvalidPlacement(raw.to_string())),
        }
    }

    /// Both sentinels count as "not classified"
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Placement::Ranked(_))
    }

    pub fn rank(&self) -> Option<u32> {
        match self {
            Placement::Ranked(place) => Some(*place),
            _ => None,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Ranked(place) => write!(f, "{}.", place),
            Placement::Disqualified => f.write_str(DISQUALIFIED),
            Placement::MissingStart => f.write_str(MISSING_START),
        }
    }
}

impl std::str::FromStr for Placement {
    type Err = SeasonError;

    fn from_str(s: &str) -> Result<Self> {
        Placement::parse(s)
    }
}

// Stored as the display string so CSV files stay human readable
impl Serialize for Placement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Placement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Placement::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// POINTS
// ============================================================================

/// Points awarded for a placement. Total and monotone non-increasing.
pub fn points(placement: &Placement) -> u32 {
    match placement {
        Placement::Ranked(1) => 200,
        Placement::Ranked(2) => 190,
        Placement::Ranked(3) => 182,
        Placement::Ranked(4) => 176,
        Placement::Ranked(5) => 172,
        Placement::Ranked(place) if *place <= LAST_SCORING_PLACE => 176 - place,
        _ => 0,
    }
}

// ============================================================================
// TESTS
// ============================================================================
