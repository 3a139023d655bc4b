//! Listing data model: the candidates users are matched against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::date_range::DateRange;

/// What a listing offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    /// Reciprocal exchange of rooms between two students.
    HousingSwap,
    AuPair,
    Rental,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HousingSwap => "housing_swap",
            Self::AuPair => "au_pair",
            Self::Rental => "rental",
        }
    }
}

impl std::fmt::Display for ListingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "housing_swap" => Ok(Self::HousingSwap),
            "au_pair" => Ok(Self::AuPair),
            "rental" => Ok(Self::Rental),
            other => Err(format!("unknown listing kind: {other}")),
        }
    }
}

/// A published listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub kind: ListingKind,
    pub title: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    /// Dates the accommodation is available.
    pub available: DateRange,
    /// Monthly rent in whole euros, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<u32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photos: Vec<String>,
    /// Account that published the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Request body for publishing a listing.
#[derive(Debug, Clone, Deserialize)]
pub struct NewListing {
    pub kind: ListingKind,
    pub title: String,
    pub city: String,
    #[serde(default)]
    pub university: Option<String>,
    pub available: DateRange,
    #[serde(default)]
    pub monthly_rent: Option<u32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

impl NewListing {
    /// Check the fields a listing cannot be published without.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.city.trim().is_empty() {
            return Err("city must not be empty".to_string());
        }
        Ok(())
    }

    /// Assign an id and creation time.
    pub fn into_listing(self) -> Listing {
        Listing {
            id: Uuid::new_v4(),
            kind: self.kind,
            title: self.title.trim().to_string(),
            city: self.city.trim().to_string(),
            university: self.university.filter(|u| !u.trim().is_empty()),
            available: self.available,
            monthly_rent: self.monthly_rent,
            description: self.description,
            photos: self.photos,
            owner_id: self.owner_id,
            created_at: Utc::now(),
        }
    }
}
