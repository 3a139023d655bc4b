//! Onboarding state machine: gates step transitions on the draft profile.

use secrecy::ExposeSecret;
use tracing::debug;

use super::model::{OnboardingProfile, ProfileSnapshot, ProfileUpdate, VerificationMethod};
use super::state::OnboardingStep;
use crate::error::OnboardingError;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// A draft profile together with the step the user is on.
///
/// Owned by one session; created empty at flow start, finalized at
/// [`OnboardingStep::Completion`] or dropped when the user abandons it.
#[derive(Debug, Clone, Default)]
pub struct OnboardingStateMachine {
    step: OnboardingStep,
    profile: OnboardingProfile,
}

impl OnboardingStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    pub fn profile(&self) -> &OnboardingProfile {
        &self.profile
    }

    /// Move to the next step if the current one is complete. Otherwise
    /// nothing changes. Returns the step the machine is on afterwards.
    pub fn advance(&mut self) -> OnboardingStep {
        let Some(next) = self.step.next() else {
            return self.step;
        };
        if !self.is_step_complete() {
            debug!(step = %self.step, "Step incomplete, not advancing");
            return self.step;
        }
        debug_assert!(self.step.can_transition_to(next));
        self.step = next;
        self.step
    }

    /// Move back one step, keeping all entered data. No-op on the first
    /// and the terminal step.
    pub fn retreat(&mut self) -> OnboardingStep {
        if self.step.is_terminal() {
            return self.step;
        }
        if let Some(previous) = self.step.previous() {
            debug_assert!(self.step.can_transition_to(previous));
            self.step = previous;
        }
        self.step
    }

    /// Shallow-merge a partial update into the draft.
    pub fn merge_update(&mut self, update: ProfileUpdate) {
        debug!(step = %self.step, fields = ?update.changed_fields(), "Merging profile update");
        self.profile.merge(update);
    }

    /// Snapshot the draft for submission. Only valid at the terminal step.
    pub fn finalize(&self) -> Result<ProfileSnapshot, OnboardingError> {
        if !self.step.is_terminal() {
            return Err(OnboardingError::NotFinished { step: self.step });
        }
        Ok(self.profile.snapshot())
    }

    /// Whether the current step's completeness predicate holds.
    pub fn is_step_complete(&self) -> bool {
        self.missing_requirements().is_empty()
    }

    /// Reasons the current step cannot be left yet. Empty when complete.
    pub fn missing_requirements(&self) -> Vec<&'static str> {
        requirements_for(self.step, &self.profile)
    }
}

/// Evaluate the completeness predicate of `step` against `profile`.
pub fn requirements_for(step: OnboardingStep, profile: &OnboardingProfile) -> Vec<&'static str> {
    let mut missing = Vec::new();
    match step {
        OnboardingStep::Identity | OnboardingStep::Completion => {}
        OnboardingStep::Schedule => match (profile.start_date, profile.end_date) {
            (None, _) => missing.push("start date is required"),
            (_, None) => missing.push("end date is required"),
            (Some(start), Some(end)) if end < start => {
                missing.push("end date must not be before start date")
            }
            _ => {}
        },
        OnboardingStep::Preferences => {
            if profile.current_location.trim().is_empty() {
                missing.push("current location is required");
            }
            if profile.budget.is_none() {
                missing.push("budget range is required");
            }
        }
        OnboardingStep::Verification => match profile.verification_method {
            VerificationMethod::Email => {
                if profile
                    .university_email
                    .as_deref()
                    .is_none_or(|e| e.trim().is_empty())
                {
                    missing.push("university email is required");
                }
            }
            VerificationMethod::Id => {
                if profile.verification_document.is_none() {
                    missing.push("student ID document is required");
                }
            }
        },
        OnboardingStep::AccountCreation => {
            let password = profile.password.as_ref().map(|p| p.expose_secret());
            let confirm = profile.confirm_password.as_ref().map(|p| p.expose_secret());
            if profile.email.trim().is_empty() {
                missing.push("email is required");
            }
            match (password, confirm) {
                (None, _) | (Some(""), _) => missing.push("password is required"),
                (_, None) | (_, Some("")) => missing.push("password confirmation is required"),
                (Some(p), Some(c)) => {
                    if p != c {
                        missing.push("passwords do not match");
                    }
                    if p.chars().count() < MIN_PASSWORD_LEN {
                        missing.push("password must be at least 6 characters");
                    }
                }
            }
        }
    }
    missing
}
