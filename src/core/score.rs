//! Fixed-weight quality score.
//!
//! Four independent bands each award full points, half points or nothing.
//! The score is their sum, so it ranges over `0..=MAX_SCORE`.

use crate::core::metrics::{Metric, MetricsRow};

pub const YIELD_POINTS: u32 = 30;
pub const DEBT_POINTS: u32 = 30;
pub const INSIDER_POINTS: u32 = 20;
pub const PE_POINTS: u32 = 20;

pub const MAX_SCORE: u32 = YIELD_POINTS + DEBT_POINTS + INSIDER_POINTS + PE_POINTS;

const DEBT_FULL_MAX: f64 = 2.0;
const DEBT_HALF_MAX: f64 = 4.0;
const INSIDER_FULL_MIN: f64 = 5.0;
const INSIDER_HALF_MIN: f64 = 1.0;
const PE_FULL_BELOW: f64 = 15.0;
const PE_HALF_BELOW: f64 = 25.0;

fn yield_band(yield_pct: f64, threshold: f64) -> u32 {
    if yield_pct >= threshold {
        YIELD_POINTS
    } else if yield_pct > 0.0 {
        YIELD_POINTS / 2
    } else {
        0
    }
}

fn debt_band(debt_to_ebitda: f64) -> u32 {
    if debt_to_ebitda <= DEBT_FULL_MAX {
        DEBT_POINTS
    } else if debt_to_ebitda <= DEBT_HALF_MAX {
        DEBT_POINTS / 2
    } else {
        0
    }
}

fn insider_band(insider_pct: f64) -> u32 {
    if insider_pct >= INSIDER_FULL_MIN {
        INSIDER_POINTS
    } else if insider_pct >= INSIDER_HALF_MIN {
        INSIDER_POINTS / 2
    } else {
        0
    }
}

fn pe_band(pe: f64) -> u32 {
    if pe < PE_FULL_BELOW {
        PE_POINTS
    } else if pe < PE_HALF_BELOW {
        PE_POINTS / 2
    } else {
        0
    }
}

/// Scores a row against the user's minimum yield. Unknown metrics use their
/// column fallback.
pub fn score(row: &MetricsRow, yield_threshold: f64) -> u32 {
    yield_band(Metric::Yield.value(row), yield_threshold)
        + debt_band(Metric::DebtEbitda.value(row))
        + insider_band(Metric::Insider.value(row))
        + pe_band(Metric::Pe.value(row))
}

/// Fills in the score of every row.
pub fn apply_scores(rows: &mut [MetricsRow], yield_threshold: f64) {
    for row in rows {
        row.score = Some(score(row, yield_threshold));
    }
}
