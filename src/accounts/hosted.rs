//! Hosted identity provider over HTTP.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Account, IdentityProvider, redact_email};
use crate::config::HostedAuthConfig;
use crate::error::AccountError;

/// Signs users up against a hosted auth service's `/auth/v1/signup`
/// endpoint.
pub struct HostedIdentityProvider {
    client: reqwest::Client,
    signup_url: String,
    api_key: SecretString,
}

#[derive(Deserialize)]
struct SignupUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

/// The service answers either with the user object itself or wrapped
/// in a session envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignupResponse {
    Session { user: SignupUser },
    User(SignupUser),
}

#[derive(Deserialize, Default)]
struct SignupErrorBody {
    #[serde(default, alias = "msg", alias = "error_description")]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

impl HostedIdentityProvider {
    pub fn new(config: &HostedAuthConfig) -> Result<Self, AccountError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AccountError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            signup_url: format!("{}/auth/v1/signup", config.base_url),
            api_key: config.api_key.clone(),
        })
    }
}

fn is_duplicate(status: StatusCode, body: &SignupErrorBody) -> bool {
    if status == StatusCode::CONFLICT {
        return true;
    }
    let code_says_so = body
        .error_code
        .as_deref()
        .is_some_and(|c| c == "user_already_exists" || c == "email_exists");
    let message_says_so = body
        .message
        .as_deref()
        .is_some_and(|m| m.to_lowercase().contains("already registered"));
    code_says_so || message_says_so
}

#[async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Account, AccountError> {
        let response = self
            .client
            .post(&self.signup_url)
            .header("apikey", self.api_key.expose_secret())
            .json(&serde_json::json!({
                "email": email,
                "password": password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| AccountError::Other(format!("Sign-up request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body: SignupErrorBody = response.json().await.unwrap_or_default();
            if is_duplicate(status, &body) {
                info!(email = %redact_email(email), "Sign-up rejected: email already registered");
                return Err(AccountError::AlreadyRegistered);
            }
            let reason = body.message.unwrap_or_else(|| status.to_string());
            warn!(%status, %reason, "Hosted sign-up failed");
            return Err(AccountError::Other(reason));
        }

        let parsed: SignupResponse = response
            .json()
            .await
            .map_err(|e| AccountError::Other(format!("Invalid sign-up response: {e}")))?;
        let user = match parsed {
            SignupResponse::Session { user } => user,
            SignupResponse::User(user) => user,
        };

        info!(account_id = %user.id, "Account created with hosted provider");
        Ok(Account {
            id: user.id,
            email: user.email.unwrap_or_else(|| email.to_string()),
        })
    }
}
