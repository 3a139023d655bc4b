//! Onboarding system: the multi-step flow a new user walks through.
//!
//! A session holds a draft profile and the current step. Each step has a
//! completeness predicate that gates `advance()`; leaving the account step
//! creates the account and persists the finished profile.

pub mod machine;
pub mod manager;
pub mod model;
pub mod routes;
pub mod state;

pub use machine::{MIN_PASSWORD_LEN, OnboardingStateMachine};
pub use manager::{AdvanceOutcome, OnboardingManager, SessionView, spawn_expiry_task};
pub use model::{
    BudgetRange, LifestylePreferences, OnboardingProfile, ProfileSnapshot, ProfileUpdate, Rating,
    VerificationMethod,
};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::OnboardingStep;
