//! OnboardingManager: owns live onboarding sessions and runs the
//! account submission when a user leaves the account step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::machine::OnboardingStateMachine;
use super::model::{OnboardingProfile, ProfileUpdate};
use super::state::OnboardingStep;
use crate::accounts::{Account, IdentityProvider};
use crate::error::{AccountError, DatabaseError, OnboardingError, SubmissionError};
use crate::store::{Database, StoredProfile};

/// One user's pass through the onboarding flow.
#[derive(Debug)]
pub struct OnboardingSession {
    id: Uuid,
    machine: OnboardingStateMachine,
    /// Set once the identity provider accepted the sign-up. A session that
    /// has an account never signs up again; it only retries the save.
    account: Option<Account>,
    profile_saved: bool,
    last_activity: DateTime<Utc>,
}

impl OnboardingSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            machine: OnboardingStateMachine::new(),
            account: None,
            profile_saved: false,
            last_activity: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    fn is_idle(&self, max_age: Duration) -> bool {
        let idle = Utc::now().signed_duration_since(self.last_activity);
        idle.to_std().is_ok_and(|idle| idle >= max_age)
    }

    /// The draft is frozen once an account exists for it.
    fn is_finished(&self) -> bool {
        self.account.is_some() || self.machine.step().is_terminal()
    }

    fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            step: self.machine.step(),
            position: self.machine.step().position(),
            step_complete: self.machine.is_step_complete(),
            missing: self.machine.missing_requirements(),
            profile: self.machine.profile().clone(),
            account_id: self.account.as_ref().map(|a| a.id),
        }
    }
}

/// What clients see of a session. The draft serializes without its
/// credentials.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub step: OnboardingStep,
    /// One-based index of `step`, for progress display.
    pub position: usize,
    pub step_complete: bool,
    pub missing: Vec<&'static str>,
    pub profile: OnboardingProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
}

/// Result of an advance request.
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub session: SessionView,
    /// Present only when the advance triggered (or retried) a submission.
    pub submission: Option<Result<Account, SubmissionError>>,
}

/// Registry of in-progress sessions plus the collaborators that receive a
/// finished profile.
pub struct OnboardingManager {
    identity: Arc<dyn IdentityProvider>,
    db: Arc<dyn Database>,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<OnboardingSession>>>>,
}

impl OnboardingManager {
    pub fn new(identity: Arc<dyn IdentityProvider>, db: Arc<dyn Database>) -> Self {
        Self {
            identity,
            db,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new session at the first step with an empty draft.
    pub async fn create_session(&self) -> SessionView {
        let session = OnboardingSession::new();
        let view = session.view();
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::new(Mutex::new(session)));
        info!(session_id = %view.id, "Onboarding session created");
        view
    }

    /// Number of sessions still in progress.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn view(&self, id: Uuid) -> Result<SessionView, OnboardingError> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;
        session.touch();
        Ok(session.view())
    }

    /// Merge a partial update into the session's draft.
    ///
    /// Rejected with [`OnboardingError::Finished`] once the account has
    /// been created, so a retried save writes the profile the account was
    /// created from.
    pub async fn update(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<SessionView, OnboardingError> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;
        session.touch();
        if session.is_finished() {
            debug!(session_id = %id, fields = ?update.changed_fields(), "Update rejected, onboarding finished");
            return Err(OnboardingError::Finished);
        }
        if !update.is_empty() {
            session.machine.merge_update(update);
        }
        Ok(session.view())
    }

    /// Move the session forward.
    ///
    /// Leaving `AccountCreation` creates the account and persists the
    /// finished profile. A session stuck at `Completion` after a failed
    /// save retries only the save.
    pub async fn advance(&self, id: Uuid) -> Result<AdvanceOutcome, OnboardingError> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;
        session.touch();

        let submission = match session.machine.step() {
            OnboardingStep::AccountCreation if session.machine.is_step_complete() => {
                Some(self.submit(&mut session).await)
            }
            OnboardingStep::Completion if !session.profile_saved => {
                Some(self.save_profile(&mut session).await)
            }
            from => {
                let to = session.machine.advance();
                if to == from {
                    debug!(session_id = %id, step = %from, "Advance was a no-op");
                } else {
                    info!(session_id = %id, from = %from, to = %to, "Onboarding step advanced");
                }
                None
            }
        };

        let view = session.view();
        if session.profile_saved && submission.is_some() {
            self.sessions.write().await.remove(&id);
            info!(session_id = %id, "Onboarding finished, session closed");
        }
        Ok(AdvanceOutcome {
            session: view,
            submission,
        })
    }

    /// Move the session back one step.
    pub async fn retreat(&self, id: Uuid) -> Result<SessionView, OnboardingError> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;
        session.touch();
        let from = session.machine.step();
        let to = session.machine.retreat();
        if to != from {
            info!(session_id = %id, from = %from, to = %to, "Onboarding step retreated");
        }
        Ok(session.view())
    }

    /// Drop a session and its draft.
    pub async fn discard(&self, id: Uuid) -> Result<(), OnboardingError> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!(session_id = %id, "Onboarding session discarded");
                Ok(())
            }
            None => Err(OnboardingError::SessionNotFound(id)),
        }
    }

    /// Discard sessions nobody has touched for longer than `max_age`.
    /// Sessions busy in another request are left alone. Returns the number
    /// of sessions removed.
    pub async fn expire_idle(&self, max_age: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| {
            let Ok(session) = handle.try_lock() else {
                return true;
            };
            if !session.is_idle(max_age) {
                return true;
            }
            match &session.account {
                Some(account) => warn!(
                    session_id = %id,
                    account_id = %account.id,
                    "Discarding idle session whose profile was never saved"
                ),
                None => debug!(session_id = %id, "Idle onboarding session discarded"),
            }
            false
        });
        let expired = before - sessions.len();
        if expired > 0 {
            info!(expired, remaining = sessions.len(), "Expired idle onboarding sessions");
        }
        expired
    }

    /// Look up a finished profile.
    pub async fn stored_profile(
        &self,
        account_id: Uuid,
    ) -> Result<Option<StoredProfile>, DatabaseError> {
        self.db.get_profile(account_id).await
    }

    async fn session(&self, id: Uuid) -> Result<Arc<Mutex<OnboardingSession>>, OnboardingError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(OnboardingError::SessionNotFound(id))
    }

    async fn submit(&self, session: &mut OnboardingSession) -> Result<Account, SubmissionError> {
        let profile = session.machine.profile();
        let email = profile.email.trim().to_string();
        let Some(password) = profile.password.clone() else {
            return Err(SubmissionError::AccountFailed(
                "password is required".to_string(),
            ));
        };

        let account = match self.identity.create_account(&email, &password).await {
            Ok(account) => account,
            Err(AccountError::AlreadyRegistered) => {
                info!(session_id = %session.id, "Submission rejected: email already registered");
                return Err(SubmissionError::AccountExists);
            }
            Err(AccountError::Other(reason)) => {
                warn!(session_id = %session.id, %reason, "Account creation failed");
                return Err(SubmissionError::AccountFailed(reason));
            }
        };
        info!(session_id = %session.id, account_id = %account.id, "Account created");

        session.account = Some(account);
        session.machine.advance();
        self.save_profile(session).await
    }

    async fn save_profile(
        &self,
        session: &mut OnboardingSession,
    ) -> Result<Account, SubmissionError> {
        let Some(account) = session.account.clone() else {
            return Err(SubmissionError::AccountFailed(
                "no account to attach the profile to".to_string(),
            ));
        };
        let snapshot = session
            .machine
            .finalize()
            .map_err(|e| SubmissionError::ProfileNotSaved {
                account_id: account.id,
                reason: e.to_string(),
            })?;

        if let Err(e) = self.db.save_profile(account.id, &snapshot).await {
            warn!(
                session_id = %session.id,
                account_id = %account.id,
                error = %e,
                "Failed to persist profile"
            );
            return Err(SubmissionError::ProfileNotSaved {
                account_id: account.id,
                reason: e.to_string(),
            });
        }

        session.profile_saved = true;
        info!(session_id = %session.id, account_id = %account.id, "Profile saved");
        Ok(account)
    }
}

/// Spawn a background task that expires idle sessions every `every`.
pub fn spawn_expiry_task(
    manager: Arc<OnboardingManager>,
    every: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            manager.expire_idle(max_age).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use secrecy::SecretString;

    use super::*;
    use crate::matching::{Listing, ListingKind};
    use crate::onboarding::model::BudgetRange;
    use crate::onboarding::ProfileSnapshot;
    use crate::store::LibSqlBackend;

    /// Identity provider that remembers emails in memory.
    #[derive(Default)]
    struct StubIdentity {
        emails: Mutex<Vec<String>>,
        calls: AtomicUsize,
        unavailable: AtomicBool,
    }

    #[async_trait]
    impl IdentityProvider for StubIdentity {
        async fn create_account(
            &self,
            email: &str,
            _password: &SecretString,
        ) -> Result<Account, AccountError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AccountError::Other("service unavailable".to_string()));
            }
            let mut emails = self.emails.lock().await;
            if emails.iter().any(|e| e.eq_ignore_ascii_case(email)) {
                return Err(AccountError::AlreadyRegistered);
            }
            emails.push(email.to_string());
            Ok(Account {
                id: Uuid::new_v4(),
                email: email.to_string(),
            })
        }
    }

    /// Profile store whose saves can be switched off.
    struct FlakyStore {
        inner: LibSqlBackend,
        failing: AtomicBool,
    }

    #[async_trait]
    impl Database for FlakyStore {
        async fn save_profile(
            &self,
            account_id: Uuid,
            profile: &ProfileSnapshot,
        ) -> Result<(), DatabaseError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DatabaseError::Query("disk full".to_string()));
            }
            self.inner.save_profile(account_id, profile).await
        }

        async fn get_profile(
            &self,
            account_id: Uuid,
        ) -> Result<Option<StoredProfile>, DatabaseError> {
            self.inner.get_profile(account_id).await
        }

        async fn insert_listing(&self, listing: &Listing) -> Result<(), DatabaseError> {
            self.inner.insert_listing(listing).await
        }

        async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>, DatabaseError> {
            self.inner.get_listing(id).await
        }

        async fn list_listings(
            &self,
            kind: Option<ListingKind>,
        ) -> Result<Vec<Listing>, DatabaseError> {
            self.inner.list_listings(kind).await
        }
    }

    struct Harness {
        manager: Arc<OnboardingManager>,
        identity: Arc<StubIdentity>,
        store: Arc<FlakyStore>,
    }

    async fn harness() -> Harness {
        let identity = Arc::new(StubIdentity::default());
        let store = Arc::new(FlakyStore {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            failing: AtomicBool::new(false),
        });
        let manager = Arc::new(OnboardingManager::new(identity.clone(), store.clone()));
        Harness {
            manager,
            identity,
            store,
        }
    }

    fn complete_draft(email: &str) -> ProfileUpdate {
        ProfileUpdate {
            full_name: Some("Ana Souza".to_string()),
            email: Some(email.to_string()),
            password: Some("secret1".to_string()),
            confirm_password: Some("secret1".to_string()),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 31),
            current_location: Some("Porto".to_string()),
            budget: Some(BudgetRange::From300To500),
            university_email: Some("ana@up.pt".to_string()),
            ..ProfileUpdate::default()
        }
    }

    /// Create a session with a full draft and walk it to `AccountCreation`.
    async fn session_at_account_step(manager: &OnboardingManager, email: &str) -> Uuid {
        let id = manager.create_session().await.id;
        manager.update(id, complete_draft(email)).await.unwrap();
        for _ in 0..4 {
            let outcome = manager.advance(id).await.unwrap();
            assert!(outcome.submission.is_none());
        }
        assert_eq!(
            manager.view(id).await.unwrap().step,
            OnboardingStep::AccountCreation
        );
        id
    }

    #[tokio::test]
    async fn new_session_starts_at_identity() {
        let h = harness().await;
        let view = h.manager.create_session().await;
        assert_eq!(view.step, OnboardingStep::Identity);
        assert_eq!(view.position, 1);
        assert!(view.step_complete);
        assert!(view.missing.is_empty());
        assert_eq!(h.manager.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let h = harness().await;
        let id = Uuid::new_v4();
        assert_eq!(
            h.manager.view(id).await.unwrap_err(),
            OnboardingError::SessionNotFound(id)
        );
        assert!(h.manager.advance(id).await.is_err());
        assert!(h.manager.discard(id).await.is_err());
    }

    #[tokio::test]
    async fn incomplete_step_reports_missing() {
        let h = harness().await;
        let id = h.manager.create_session().await.id;
        h.manager.advance(id).await.unwrap();
        let outcome = h.manager.advance(id).await.unwrap();
        assert_eq!(outcome.session.step, OnboardingStep::Schedule);
        assert!(!outcome.session.step_complete);
        assert_eq!(outcome.session.missing, vec!["start date is required"]);
    }

    #[tokio::test]
    async fn successful_submission_saves_profile() {
        let h = harness().await;
        let id = session_at_account_step(&h.manager, "ana@example.com").await;

        let outcome = h.manager.advance(id).await.unwrap();
        let account = outcome.submission.unwrap().unwrap();
        assert_eq!(outcome.session.step, OnboardingStep::Completion);
        assert_eq!(outcome.session.account_id, Some(account.id));

        let stored = h.manager.stored_profile(account.id).await.unwrap().unwrap();
        assert_eq!(stored.profile.full_name, "Ana Souza");
        assert_eq!(stored.profile.current_location, "Porto");

        // Finished sessions leave the registry.
        assert_eq!(h.manager.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn email_collision_keeps_account_step() {
        let h = harness().await;
        let first = session_at_account_step(&h.manager, "ana@example.com").await;
        h.manager.advance(first).await.unwrap();

        let second = session_at_account_step(&h.manager, "ANA@example.com").await;
        let outcome = h.manager.advance(second).await.unwrap();
        assert_eq!(
            outcome.submission.unwrap().unwrap_err(),
            SubmissionError::AccountExists
        );
        assert_eq!(outcome.session.step, OnboardingStep::AccountCreation);
        assert_eq!(outcome.session.profile.full_name, "Ana Souza");

        // A different email goes through.
        h.manager
            .update(
                second,
                ProfileUpdate {
                    email: Some("bea@example.com".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        let outcome = h.manager.advance(second).await.unwrap();
        assert!(outcome.submission.unwrap().is_ok());
    }

    #[tokio::test]
    async fn provider_failure_keeps_account_step() {
        let h = harness().await;
        h.identity.unavailable.store(true, Ordering::SeqCst);
        let id = session_at_account_step(&h.manager, "ana@example.com").await;
        let outcome = h.manager.advance(id).await.unwrap();
        assert_eq!(
            outcome.submission.unwrap().unwrap_err(),
            SubmissionError::AccountFailed("service unavailable".to_string())
        );
        assert_eq!(outcome.session.step, OnboardingStep::AccountCreation);
    }

    #[tokio::test]
    async fn store_failure_keeps_completion_and_retry_only_saves() {
        let h = harness().await;
        h.store.failing.store(true, Ordering::SeqCst);
        let id = session_at_account_step(&h.manager, "ana@example.com").await;

        let outcome = h.manager.advance(id).await.unwrap();
        let err = outcome.submission.unwrap().unwrap_err();
        let SubmissionError::ProfileNotSaved { account_id, .. } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(outcome.session.step, OnboardingStep::Completion);
        assert_eq!(outcome.session.account_id, Some(account_id));
        assert_eq!(h.manager.active_sessions().await, 1);

        h.store.failing.store(false, Ordering::SeqCst);
        let outcome = h.manager.advance(id).await.unwrap();
        let account = outcome.submission.unwrap().unwrap();
        assert_eq!(account.id, account_id);
        assert_eq!(h.identity.calls.load(Ordering::SeqCst), 1);
        assert!(h.manager.stored_profile(account_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn draft_is_frozen_once_account_exists() {
        let h = harness().await;
        h.store.failing.store(true, Ordering::SeqCst);
        let id = session_at_account_step(&h.manager, "ana@example.com").await;
        let outcome = h.manager.advance(id).await.unwrap();
        assert!(outcome.submission.unwrap().is_err());

        let err = h
            .manager
            .update(
                id,
                ProfileUpdate {
                    email: Some("someone-else@example.com".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, OnboardingError::Finished);

        h.store.failing.store(false, Ordering::SeqCst);
        let account = h.manager.advance(id).await.unwrap().submission.unwrap().unwrap();
        let stored = h.manager.stored_profile(account.id).await.unwrap().unwrap();
        assert_eq!(account.email, "ana@example.com");
        assert_eq!(stored.profile.email, account.email);
    }

    /// Pretend the session was last used `ago` in the past.
    async fn backdate(manager: &OnboardingManager, id: Uuid, ago: chrono::Duration) {
        let handle = manager.sessions.read().await.get(&id).cloned().unwrap();
        handle.lock().await.last_activity = Utc::now() - ago;
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let h = harness().await;
        let stale = h.manager.create_session().await.id;
        let fresh = h.manager.create_session().await.id;
        backdate(&h.manager, stale, chrono::Duration::hours(2)).await;

        let expired = h.manager.expire_idle(Duration::from_secs(30 * 60)).await;
        assert_eq!(expired, 1);
        assert_eq!(h.manager.active_sessions().await, 1);
        assert_eq!(
            h.manager.view(stale).await.unwrap_err(),
            OnboardingError::SessionNotFound(stale)
        );
        assert!(h.manager.view(fresh).await.is_ok());
    }

    #[tokio::test]
    async fn activity_keeps_session_alive() {
        let h = harness().await;
        let id = h.manager.create_session().await.id;
        backdate(&h.manager, id, chrono::Duration::hours(2)).await;
        h.manager.advance(id).await.unwrap();

        assert_eq!(h.manager.expire_idle(Duration::from_secs(30 * 60)).await, 0);
        assert_eq!(h.manager.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn busy_sessions_survive_expiry() {
        let h = harness().await;
        let id = h.manager.create_session().await.id;
        backdate(&h.manager, id, chrono::Duration::hours(2)).await;

        let handle = h.manager.sessions.read().await.get(&id).cloned().unwrap();
        let guard = handle.lock().await;
        assert_eq!(h.manager.expire_idle(Duration::from_secs(60)).await, 0);
        drop(guard);
        assert_eq!(h.manager.expire_idle(Duration::from_secs(60)).await, 1);
    }

    #[tokio::test]
    async fn many_abandoned_sessions_are_reclaimed() {
        let h = harness().await;
        for _ in 0..1000 {
            h.manager.create_session().await;
        }
        assert_eq!(h.manager.active_sessions().await, 1000);
        assert_eq!(h.manager.expire_idle(Duration::ZERO).await, 1000);
        assert_eq!(h.manager.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn concurrent_submissions_create_one_account() {
        let h = harness().await;
        let id = session_at_account_step(&h.manager, "ana@example.com").await;

        let (a, b) = tokio::join!(h.manager.advance(id), h.manager.advance(id));
        let submissions: Vec<_> = [a, b]
            .into_iter()
            .filter_map(|r| r.ok().and_then(|o| o.submission))
            .collect();
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].is_ok());
        assert_eq!(h.identity.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retreat_and_discard() {
        let h = harness().await;
        let id = h.manager.create_session().await.id;
        h.manager.update(id, complete_draft("ana@example.com")).await.unwrap();
        h.manager.advance(id).await.unwrap();
        h.manager.advance(id).await.unwrap();
        let view = h.manager.retreat(id).await.unwrap();
        assert_eq!(view.step, OnboardingStep::Schedule);
        assert_eq!(view.profile.current_location, "Porto");

        h.manager.discard(id).await.unwrap();
        assert_eq!(h.manager.active_sessions().await, 0);
        assert!(h.manager.view(id).await.is_err());
    }

    #[tokio::test]
    async fn view_never_serializes_credentials() {
        let h = harness().await;
        let id = h.manager.create_session().await.id;
        let view = h
            .manager
            .update(id, complete_draft("ana@example.com"))
            .await
            .unwrap();
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("secret1"));
        assert!(!json.contains("password"));
    }
}
