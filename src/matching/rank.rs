//! Candidate ranking by compatibility.

use serde::Serialize;

use super::date_range::DateRange;
use super::listing::Listing;
use super::score::{CompatibilityResult, score_ranges};
use crate::error::ScoreError;

/// A listing paired with its score against the viewer's dates.
#[derive(Debug, Clone, Serialize)]
pub struct RankedMatch {
    pub listing: Listing,
    pub compatibility: CompatibilityResult,
}

/// Score every listing against `reference` and order best-first.
///
/// Ties keep their input order. Listings without overlap sort last.
/// A zero-length reference is rejected even when there is nothing to rank.
pub fn rank_candidates(
    reference: &DateRange,
    listings: Vec<Listing>,
) -> Result<Vec<RankedMatch>, ScoreError> {
    if reference.num_days() <= 0 {
        return Err(ScoreError::EmptyReferenceRange);
    }
    let mut ranked = listings
        .into_iter()
        .map(|listing| {
            score_ranges(reference, &listing.available).map(|compatibility| RankedMatch {
                listing,
                compatibility,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    ranked.sort_by(|a, b| {
        b.compatibility
            .tier
            .cmp(&a.compatibility.tier)
            .then(b.compatibility.percentage.cmp(&a.compatibility.percentage))
    });
    Ok(ranked)
}
