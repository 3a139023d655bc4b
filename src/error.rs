//! Error types for studyswap.

use uuid::Uuid;

use crate::onboarding::OnboardingStep;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures reported by the identity provider when creating an account.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("An account with this email is already registered")]
    AlreadyRegistered,

    #[error("Account creation failed: {0}")]
    Other(String),
}

/// Onboarding session errors. Incomplete steps are not errors; `advance()`
/// simply stays put.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OnboardingError {
    #[error("Onboarding is not finished (currently at {step})")]
    NotFinished { step: OnboardingStep },

    #[error("Onboarding session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Onboarding is finished; the profile can no longer be edited")]
    Finished,
}

/// Outcome of a failed submission at the end of onboarding. The draft is
/// kept in every case so the user can retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("This email is already registered")]
    AccountExists,

    #[error("Could not create account: {0}")]
    AccountFailed(String),

    #[error("Saved account {account_id} but failed to persist profile: {reason}")]
    ProfileNotSaved { account_id: Uuid, reason: String },
}

/// Invalid input to the compatibility scorer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("Reference date range must span at least one day")]
    EmptyReferenceRange,

    #[error("Compatibility percentage is not a number")]
    NotANumber,
}

/// Invalid date range construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateRangeError {
    #[error("End date {end} is before start date {start}")]
    Inverted {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}
