//! StudySwap: onboarding and date-overlap matching for student housing.

pub mod accounts;
pub mod config;
pub mod error;
pub mod matching;
pub mod onboarding;
pub mod routes;
pub mod store;
