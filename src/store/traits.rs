//! `Database` trait: the async interface for profile and listing storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::matching::{Listing, ListingKind};
use crate::onboarding::ProfileSnapshot;

/// A persisted profile.
#[derive(Debug, Clone, Serialize)]
pub struct StoredProfile {
    pub account_id: Uuid,
    pub profile: ProfileSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Backend-agnostic database trait covering profiles and listings.
#[async_trait]
pub trait Database: Send + Sync {
    // ── Profiles ────────────────────────────────────────────────────

    /// Store (or replace) the profile belonging to `account_id`.
    async fn save_profile(
        &self,
        account_id: Uuid,
        profile: &ProfileSnapshot,
    ) -> Result<(), DatabaseError>;

    /// Get the profile belonging to `account_id`.
    async fn get_profile(&self, account_id: Uuid) -> Result<Option<StoredProfile>, DatabaseError>;

    // ── Listings ────────────────────────────────────────────────────

    /// Insert a new listing.
    async fn insert_listing(&self, listing: &Listing) -> Result<(), DatabaseError>;

    /// Get a listing by ID.
    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>, DatabaseError>;

    /// List listings, newest first, optionally of one kind only.
    async fn list_listings(&self, kind: Option<ListingKind>) -> Result<Vec<Listing>, DatabaseError>;
}
