//! Onboarding draft profile, partial updates, and finalized snapshots.

use chrono::NaiveDate;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Monthly budget bracket, in euros. Serialized as the token the client
/// picks from, e.g. `"300-500"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetRange {
    #[serde(rename = "0-300")]
    UpTo300,
    #[serde(rename = "300-500")]
    From300To500,
    #[serde(rename = "500-700")]
    From500To700,
    #[serde(rename = "700-1000")]
    From700To1000,
    #[serde(rename = "1000+")]
    Over1000,
}

impl BudgetRange {
    pub fn token(&self) -> &'static str {
        match self {
            Self::UpTo300 => "0-300",
            Self::From300To500 => "300-500",
            Self::From500To700 => "500-700",
            Self::From700To1000 => "700-1000",
            Self::Over1000 => "1000+",
        }
    }
}

impl std::fmt::Display for BudgetRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// A 1–5 slider value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for Rating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value).ok_or_else(|| {
            format!(
                "rating must be between {} and {}, got {value}",
                Rating::MIN,
                Rating::MAX
            )
        })
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// Lifestyle sliders used to describe a household.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifestylePreferences {
    pub cleanliness: Rating,
    pub noise_tolerance: Rating,
    pub social_energy: Rating,
}

/// How the user proves they are a student.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// A university email address.
    #[default]
    Email,
    /// An uploaded student ID document.
    Id,
}

impl std::fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Id => write!(f, "id"),
        }
    }
}

/// The in-progress profile accumulated across onboarding steps.
///
/// Credentials are write-only: they are accepted through
/// [`ProfileUpdate`] but never serialized.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OnboardingProfile {
    // Identity
    pub full_name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Option<SecretString>,
    #[serde(skip)]
    pub confirm_password: Option<SecretString>,

    // Academic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_university: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_university: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    // Schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    // Location and budget
    pub current_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accommodation_description: Option<String>,
    pub photos: Vec<String>,

    pub preferences: LifestylePreferences,

    // Verification
    pub verification_method: VerificationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub university_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_document: Option<String>,

    pub consent: bool,
}

/// A partial profile update. `None` leaves a field untouched; an empty
/// string clears an optional text field.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub current_university: Option<String>,
    pub exchange_university: Option<String>,
    pub program: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub current_location: Option<String>,
    pub budget: Option<BudgetRange>,
    pub accommodation_description: Option<String>,
    pub photos: Option<Vec<String>>,
    pub cleanliness: Option<Rating>,
    pub noise_tolerance: Option<Rating>,
    pub social_energy: Option<Rating>,
    pub verification_method: Option<VerificationMethod>,
    pub university_email: Option<String>,
    pub verification_document: Option<String>,
    pub consent: Option<bool>,
}

impl ProfileUpdate {
    /// Whether the update carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Names of the fields this update sets, for logging.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        macro_rules! check {
            ($($field:ident),* $(,)?) => {
                $(if self.$field.is_some() { fields.push(stringify!($field)); })*
            };
        }
        check!(
            full_name,
            email,
            password,
            confirm_password,
            current_university,
            exchange_university,
            program,
            start_date,
            end_date,
            current_location,
            budget,
            accommodation_description,
            photos,
            cleanliness,
            noise_tolerance,
            social_energy,
            verification_method,
            university_email,
            verification_document,
            consent,
        );
        fields
    }
}

// Only field names are printed so passwords never reach the logs.
impl std::fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("fields", &self.changed_fields())
            .finish()
    }
}

/// Blank strings clear optional text fields.
fn optional_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl OnboardingProfile {
    /// Shallow-merge `update` into the profile. Fields absent from the
    /// update are left as they are.
    pub fn merge(&mut self, update: ProfileUpdate) {
        if let Some(v) = update.full_name {
            self.full_name = v.trim().to_string();
        }
        if let Some(v) = update.email {
            self.email = v.trim().to_string();
        }
        if let Some(v) = update.password {
            self.password = Some(SecretString::from(v));
        }
        if let Some(v) = update.confirm_password {
            self.confirm_password = Some(SecretString::from(v));
        }
        if let Some(v) = update.current_university {
            self.current_university = optional_text(v);
        }
        if let Some(v) = update.exchange_university {
            self.exchange_university = optional_text(v);
        }
        if let Some(v) = update.program {
            self.program = optional_text(v);
        }
        if let Some(v) = update.start_date {
            self.start_date = Some(v);
        }
        if let Some(v) = update.end_date {
            self.end_date = Some(v);
        }
        if let Some(v) = update.current_location {
            self.current_location = v.trim().to_string();
        }
        if let Some(v) = update.budget {
            self.budget = Some(v);
        }
        if let Some(v) = update.accommodation_description {
            self.accommodation_description = optional_text(v);
        }
        if let Some(v) = update.photos {
            self.photos = v;
        }
        if let Some(v) = update.cleanliness {
            self.preferences.cleanliness = v;
        }
        if let Some(v) = update.noise_tolerance {
            self.preferences.noise_tolerance = v;
        }
        if let Some(v) = update.social_energy {
            self.preferences.social_energy = v;
        }
        if let Some(v) = update.verification_method {
            self.verification_method = v;
        }
        if let Some(v) = update.university_email {
            self.university_email = optional_text(v);
        }
        if let Some(v) = update.verification_document {
            self.verification_document = optional_text(v);
        }
        if let Some(v) = update.consent {
            self.consent = v;
        }
    }

    /// Copy everything except the credentials.
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            current_university: self.current_university.clone(),
            exchange_university: self.exchange_university.clone(),
            program: self.program.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            current_location: self.current_location.clone(),
            budget: self.budget,
            accommodation_description: self.accommodation_description.clone(),
            photos: self.photos.clone(),
            preferences: self.preferences,
            verification_method: self.verification_method,
            university_email: self.university_email.clone(),
            verification_document: self.verification_document.clone(),
            consent: self.consent,
        }
    }
}

/// Immutable copy of a finished profile, handed to the profile store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub current_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation_description: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub preferences: LifestylePreferences,
    #[serde(default)]
    pub verification_method: VerificationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_document: Option<String>,
    #[serde(default)]
    pub consent: bool,
}
