//! Compatibility scoring: date overlap percentage and tiering.
//!
//! The percentage is the share of the *reference* range covered by the
//! overlap, so scores are asymmetric: A scored against B is not, in
//! general, B scored against A.

use serde::{Deserialize, Serialize};

use super::date_range::DateRange;
use crate::error::ScoreError;

/// Lowest percentage that counts as an excellent match.
pub const EXCELLENT_THRESHOLD: u8 = 90;
/// Lowest percentage that counts as a good match.
pub const GOOD_THRESHOLD: u8 = 70;

/// Discrete compatibility label used for display and ranking.
///
/// Variants are declared worst-first so that the derived `Ord` ranks
/// `Excellent` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityTier {
    NoOverlap,
    PartialMatch,
    GoodMatch,
    ExcellentMatch,
}

impl CompatibilityTier {
    /// Tier for a percentage where an overlap is known to exist.
    pub fn from_percentage(percentage: u8) -> Self {
        if percentage >= EXCELLENT_THRESHOLD {
            Self::ExcellentMatch
        } else if percentage >= GOOD_THRESHOLD {
            Self::GoodMatch
        } else {
            Self::PartialMatch
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExcellentMatch => "excellent match",
            Self::GoodMatch => "good match",
            Self::PartialMatch => "partial match",
            Self::NoOverlap => "no overlap",
        }
    }
}

impl std::fmt::Display for CompatibilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What to score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    /// A caller-supplied percentage, clamped to 0..=100.
    Direct { percentage: f64 },
    /// The viewing user's dates against a candidate's dates.
    Ranges {
        reference: DateRange,
        candidate: DateRange,
    },
}

/// Score plus tier. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub percentage: u8,
    pub tier: CompatibilityTier,
    /// Days in the overlap window; absent for direct scores and for
    /// disjoint ranges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_days: Option<i64>,
}

impl CompatibilityResult {
    fn no_overlap() -> Self {
        Self {
            percentage: 0,
            tier: CompatibilityTier::NoOverlap,
            overlap_days: None,
        }
    }
}

/// Score an input. Pure and deterministic.
pub fn score(input: &ScoreInput) -> Result<CompatibilityResult, ScoreError> {
    match input {
        ScoreInput::Direct { percentage } => score_direct(*percentage),
        ScoreInput::Ranges {
            reference,
            candidate,
        } => score_ranges(reference, candidate),
    }
}

/// Clamp and tier a caller-supplied percentage.
pub fn score_direct(percentage: f64) -> Result<CompatibilityResult, ScoreError> {
    if percentage.is_nan() {
        return Err(ScoreError::NotANumber);
    }
    let percentage = percentage.clamp(0.0, 100.0).round() as u8;
    Ok(CompatibilityResult {
        percentage,
        tier: CompatibilityTier::from_percentage(percentage),
        overlap_days: None,
    })
}

/// Share of `reference` covered by its overlap with `candidate`.
///
/// `reference` must span at least one day.
pub fn score_ranges(
    reference: &DateRange,
    candidate: &DateRange,
) -> Result<CompatibilityResult, ScoreError> {
    let reference_days = reference.num_days();
    if reference_days <= 0 {
        return Err(ScoreError::EmptyReferenceRange);
    }

    let Some(overlap) = reference.intersect(candidate) else {
        return Ok(CompatibilityResult::no_overlap());
    };

    let overlap_days = overlap.num_days();
    let percentage = rounded_percentage(overlap_days, reference_days);
    Ok(CompatibilityResult {
        percentage,
        tier: CompatibilityTier::from_percentage(percentage),
        overlap_days: Some(overlap_days),
    })
}

/// `round(100 * part / whole)`, half rounding up, clamped to 0..=100.
fn rounded_percentage(part: i64, whole: i64) -> u8 {
    let scaled = (200 * part + whole) / (2 * whole);
    scaled.clamp(0, 100) as u8
}
