//! Compatibility scoring between date ranges, and the listings it ranks.

pub mod date_range;
pub mod listing;
pub mod rank;
pub mod routes;
pub mod score;

pub use date_range::DateRange;
pub use listing::{Listing, ListingKind, NewListing};
pub use rank::{RankedMatch, rank_candidates};
pub use routes::{MatchingRouteState, matching_routes};
pub use score::{
    CompatibilityResult, CompatibilityTier, ScoreInput, score, score_direct, score_ranges,
};
