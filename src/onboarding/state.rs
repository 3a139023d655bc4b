//! Onboarding steps: the ordered positions of the wizard.

use serde::{Deserialize, Serialize};

/// The steps of the onboarding wizard.
///
/// Progresses linearly: Identity → Schedule → Preferences → Verification →
/// AccountCreation → Completion, with back-navigation to any earlier step
/// before Completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Identity,
    Schedule,
    Preferences,
    Verification,
    AccountCreation,
    Completion,
}

impl OnboardingStep {
    /// All steps, in order.
    pub const ALL: [OnboardingStep; 6] = [
        Self::Identity,
        Self::Schedule,
        Self::Preferences,
        Self::Verification,
        Self::AccountCreation,
        Self::Completion,
    ];

    /// Check if a transition from `self` to `target` is valid: one step
    /// forward, or one step back from a non-terminal step.
    pub fn can_transition_to(&self, target: OnboardingStep) -> bool {
        self.next() == Some(target) || (!self.is_terminal() && self.previous() == Some(target))
    }

    /// Whether this step is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion)
    }

    /// Get the next step in the linear progression, if any.
    pub fn next(&self) -> Option<OnboardingStep> {
        use OnboardingStep::*;
        match self {
            Identity => Some(Schedule),
            Schedule => Some(Preferences),
            Preferences => Some(Verification),
            Verification => Some(AccountCreation),
            AccountCreation => Some(Completion),
            Completion => None,
        }
    }

    /// Get the previous step, if any.
    pub fn previous(&self) -> Option<OnboardingStep> {
        use OnboardingStep::*;
        match self {
            Identity => None,
            Schedule => Some(Identity),
            Preferences => Some(Schedule),
            Verification => Some(Preferences),
            AccountCreation => Some(Verification),
            Completion => Some(AccountCreation),
        }
    }

    /// 1-based position, for "step 3 of 6" displays.
    pub fn position(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identity => "identity",
            Self::Schedule => "schedule",
            Self::Preferences => "preferences",
            Self::Verification => "verification",
            Self::AccountCreation => "account_creation",
            Self::Completion => "completion",
        };
        write!(f, "{s}")
    }
}
