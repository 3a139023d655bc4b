//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the HTTP API listens on.
    pub port: u16,
    /// Path of the local libSQL database file.
    pub db_path: PathBuf,
    /// Hosted identity provider. `None` means accounts are kept locally.
    pub auth: Option<HostedAuthConfig>,
    /// Onboarding sessions idle for longer than this are discarded.
    pub session_idle: Duration,
}

/// Connection details for a hosted identity provider.
#[derive(Debug, Clone)]
pub struct HostedAuthConfig {
    /// Base URL, e.g. `https://project.example.co`.
    pub base_url: String,
    /// Public API key sent with every request.
    pub api_key: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/studyswap.db"),
            auth: None,
            session_idle: Duration::from_secs(60 * 60),
        }
    }
}

impl ServerConfig {
    /// Build the configuration from `STUDYSWAP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_var(&lookup, "STUDYSWAP_PORT")?.unwrap_or(defaults.port);
        let session_idle = match parse_var::<u64, _>(&lookup, "STUDYSWAP_SESSION_IDLE_MINS")? {
            Some(mins) => Duration::from_secs(mins.saturating_mul(60)),
            None => defaults.session_idle,
        };

        let db_path = lookup("STUDYSWAP_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let auth = match lookup("STUDYSWAP_AUTH_URL").filter(|s| !s.trim().is_empty()) {
            Some(base_url) => {
                let api_key = lookup("STUDYSWAP_AUTH_KEY")
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ConfigError::MissingEnvVar("STUDYSWAP_AUTH_KEY".to_string()))?;
                let timeout_secs: u64 =
                    parse_var(&lookup, "STUDYSWAP_AUTH_TIMEOUT_SECS")?.unwrap_or(10);
                Some(HostedAuthConfig {
                    base_url: base_url.trim_end_matches('/').to_string(),
                    api_key: SecretString::from(api_key),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            None => None,
        };

        Ok(Self {
            port,
            db_path,
            auth,
            session_idle,
        })
    }
}

/// Parse a variable if it is set. Set but unparsable is an error.
fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("./data/studyswap.db"));
        assert!(config.auth.is_none());
        assert_eq!(config.session_idle, Duration::from_secs(3600));
    }

    #[test]
    fn reads_session_idle_minutes() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("STUDYSWAP_SESSION_IDLE_MINS", "15")]))
                .unwrap();
        assert_eq!(config.session_idle, Duration::from_secs(15 * 60));

        let err = ServerConfig::from_lookup(lookup_from(&[("STUDYSWAP_SESSION_IDLE_MINS", "soon")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "STUDYSWAP_SESSION_IDLE_MINS")
        );
    }

    #[test]
    fn invalid_auth_timeout_is_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[
            ("STUDYSWAP_AUTH_URL", "https://auth.example.com"),
            ("STUDYSWAP_AUTH_KEY", "anon-key"),
            ("STUDYSWAP_AUTH_TIMEOUT_SECS", "ten"),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "STUDYSWAP_AUTH_TIMEOUT_SECS")
        );
    }

    #[test]
    fn reads_port_and_db_path() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("STUDYSWAP_PORT", "9090"),
            ("STUDYSWAP_DB_PATH", "/tmp/swap.db"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.db_path, PathBuf::from("/tmp/swap.db"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[("STUDYSWAP_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "STUDYSWAP_PORT"));
    }

    #[test]
    fn hosted_auth_requires_key() {
        let err = ServerConfig::from_lookup(lookup_from(&[(
            "STUDYSWAP_AUTH_URL",
            "https://auth.example.com",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "STUDYSWAP_AUTH_KEY"));
    }

    #[test]
    fn hosted_auth_config() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("STUDYSWAP_AUTH_URL", "https://auth.example.com/"),
            ("STUDYSWAP_AUTH_KEY", "anon-key"),
            ("STUDYSWAP_AUTH_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        let auth = config.auth.unwrap();
        assert_eq!(auth.base_url, "https://auth.example.com");
        assert_eq!(auth.api_key.expose_secret(), "anon-key");
        assert_eq!(auth.timeout, Duration::from_secs(3));
    }
}
