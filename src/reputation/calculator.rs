// Manners score and letter grades.
//
// Reputation is 100 minus the user's average toxicity. It is recomputed
// from the aggregate on every read and never stored on its own, apart from
// the copy the ranking index keeps for ordering.

use serde::Serialize;

use crate::db::models::UserAggregate;
use crate::error::{ModerationError, Result};

/// `100 − toxicity_sum / message_count`.
///
/// Fails with `DivisionUndefined` when the user has no recorded messages.
pub fn reputation(aggregate: &UserAggregate) -> Result<f64> {
    if aggregate.message_count == 0 {
        return Err(ModerationError::DivisionUndefined);
    }
    Ok(100.0 - aggregate.toxicity_sum / aggregate.message_count as f64)
}

/// Round to two decimal places, the precision every score is displayed at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A display letter and its RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub letter: &'static str,
    pub color: u32,
}

/// One row of a grade table: reputations at or above `min` get `grade`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeBand {
    pub min: f64,
    pub grade: Grade,
}

const fn band(min: f64, letter: &'static str, color: u32) -> GradeBand {
    GradeBand {
        min,
        grade: Grade { letter, color },
    }
}

/// The standard scale: twelve explicit bands plus an F catch-all.
pub const STANDARD_BANDS: [GradeBand; 12] = [
    band(90.0, "A+", 0x92DCBA),
    band(85.0, "A", 0x20D6C7),
    band(80.0, "A-", 0x249FDE),
    band(77.0, "B+", 0xD6F264),
    band(73.0, "B", 0x59C135),
    band(70.0, "B-", 0x328464),
    band(67.0, "C+", 0xFFFC40),
    band(63.0, "C", 0xFFD541),
    band(60.0, "C-", 0xF9A31B),
    band(57.0, "D+", 0xF5A097),
    band(53.0, "D", 0x793A80),
    band(50.0, "D-", 0x242234),
];

/// Grade for anything below the lowest explicit band.
pub const FAILING: Grade = Grade {
    letter: "F",
    color: 0x6D758D,
};

/// Grade on the standard scale. Bands are checked from the highest `min`
/// down and the first match wins, so every reputation gets exactly one grade.
pub fn grade_band(reputation: f64) -> Grade {
    STANDARD_BANDS
        .iter()
        .find(|b| reputation >= b.min)
        .map(|b| b.grade)
        .unwrap_or(FAILING)
}
