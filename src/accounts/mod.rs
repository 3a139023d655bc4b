//! Identity provider: creates the account a finished profile belongs to.
//!
//! Two implementations exist: the libSQL backend keeps argon2-hashed
//! accounts locally, and [`HostedIdentityProvider`] forwards sign-ups to a
//! hosted auth service.

pub mod hosted;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AccountError;

pub use hosted::HostedIdentityProvider;

/// A created account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
}

/// Creates user accounts.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register `email` with `password`. A duplicate email yields
    /// [`AccountError::AlreadyRegistered`].
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Account, AccountError>;
}

/// Mask an email address for logs: `ana@example.com` becomes
/// `a***@example.com`.
pub fn redact_email(email: &str) -> String {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}
