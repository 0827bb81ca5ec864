//! Token authentication configuration.
//!
//! Configuration is loaded from environment variables. Empty values count as
//! absent. The shared secret is redacted in Debug output.

use crate::jwks::KeySetCacheConfig;
use common::jwt::MAX_CLOCK_SKEW;
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const ENV_JWT_SECRET: &str = "AUTH_JWT_SECRET";
pub const ENV_JWKS_URL: &str = "AUTH_JWKS_URL";
pub const ENV_JWKS_CACHE_DURATION_SECONDS: &str = "AUTH_JWKS_CACHE_DURATION_SECONDS";
pub const ENV_JWKS_REFRESH_PADDING_SECONDS: &str = "AUTH_JWKS_REFRESH_PADDING_SECONDS";
pub const ENV_JWKS_FETCH_TIMEOUT_SECONDS: &str = "AUTH_JWKS_FETCH_TIMEOUT_SECONDS";
pub const ENV_PRIVATE_KEY_FILE: &str = "AUTH_PRIVATE_KEY_FILE";
pub const ENV_JWT_LEEWAY_SECONDS: &str = "AUTH_JWT_LEEWAY_SECONDS";

/// Default key-set cache lifetime in seconds.
pub const DEFAULT_JWKS_CACHE_DURATION_SECONDS: u64 = 300;

/// Default minimum spacing of automatic key-set fetches in seconds.
pub const DEFAULT_JWKS_REFRESH_PADDING_SECONDS: u64 = 30;

/// Default key-set fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default leeway for `exp` and `nbf` in seconds: expired means expired.
pub const DEFAULT_JWT_LEEWAY_SECONDS: u64 = 0;

/// Token authentication configuration.
///
/// At least one of `shared_secret`, `jwks_url` and `private_key_file` is set.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC shared secret for the `Secret` strategy.
    pub shared_secret: Option<SecretString>,

    /// Key-set endpoint for the `JWKs` strategy.
    pub jwks_url: Option<String>,

    /// Key-set snapshot lifetime; 0 disables age-based expiry.
    pub jwks_cache_duration_seconds: u64,

    /// Minimum spacing of automatic key-set fetches.
    pub jwks_refresh_padding_seconds: u64,

    /// Upper bound on one key-set fetch (> 0).
    pub jwks_fetch_timeout_seconds: u64,

    /// Private key file for the `PrivateKey` strategy.
    pub private_key_file: Option<String>,

    /// Leeway for time-based claims (≤ `MAX_CLOCK_SKEW`).
    pub jwt_leeway_seconds: u64,
}

/// Custom Debug implementation that redacts the shared secret.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "shared_secret",
                &self.shared_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jwks_url", &self.jwks_url)
            .field(
                "jwks_cache_duration_seconds",
                &self.jwks_cache_duration_seconds,
            )
            .field(
                "jwks_refresh_padding_seconds",
                &self.jwks_refresh_padding_seconds,
            )
            .field("jwks_fetch_timeout_seconds", &self.jwks_fetch_timeout_seconds)
            .field("private_key_file", &self.private_key_file)
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .finish()
    }
}

impl Default for AuthConfig {
    /// No credential source; fill one in before building a service.
    fn default() -> Self {
        Self {
            shared_secret: None,
            jwks_url: None,
            jwks_cache_duration_seconds: DEFAULT_JWKS_CACHE_DURATION_SECONDS,
            jwks_refresh_padding_seconds: DEFAULT_JWKS_REFRESH_PADDING_SECONDS,
            jwks_fetch_timeout_seconds: DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
            private_key_file: None,
            jwt_leeway_seconds: DEFAULT_JWT_LEEWAY_SECONDS,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No credential source configured: set at least one of AUTH_JWT_SECRET, AUTH_JWKS_URL, AUTH_PRIVATE_KEY_FILE")]
    NoCredentialSource,

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid JWT leeway configuration: {0}")]
    InvalidJwtLeeway(String),
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`AuthConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// - `NoCredentialSource` if no secret, endpoint or key file is set
    /// - `InvalidJwksCache` for unparseable integers, a zero fetch timeout or
    ///   a refresh padding not below a non-zero cache duration
    /// - `InvalidJwtLeeway` for an unparseable or too large leeway
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let config = Self {
            // Secrets are taken verbatim, never trimmed
            shared_secret: vars
                .get(ENV_JWT_SECRET)
                .filter(|v| !v.is_empty())
                .map(|v| SecretString::from(v.clone())),
            jwks_url: non_empty(vars, ENV_JWKS_URL),
            jwks_cache_duration_seconds: parse_seconds(
                vars,
                ENV_JWKS_CACHE_DURATION_SECONDS,
                DEFAULT_JWKS_CACHE_DURATION_SECONDS,
                ConfigError::InvalidJwksCache,
            )?,
            jwks_refresh_padding_seconds: parse_seconds(
                vars,
                ENV_JWKS_REFRESH_PADDING_SECONDS,
                DEFAULT_JWKS_REFRESH_PADDING_SECONDS,
                ConfigError::InvalidJwksCache,
            )?,
            jwks_fetch_timeout_seconds: parse_seconds(
                vars,
                ENV_JWKS_FETCH_TIMEOUT_SECONDS,
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
                ConfigError::InvalidJwksCache,
            )?,
            private_key_file: non_empty(vars, ENV_PRIVATE_KEY_FILE),
            jwt_leeway_seconds: parse_seconds(
                vars,
                ENV_JWT_LEEWAY_SECONDS,
                DEFAULT_JWT_LEEWAY_SECONDS,
                ConfigError::InvalidJwtLeeway,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    ///
    /// See [`AuthConfig::from_vars`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared_secret.is_none() && self.jwks_url.is_none() && self.private_key_file.is_none()
        {
            return Err(ConfigError::NoCredentialSource);
        }

        if self.jwks_fetch_timeout_seconds == 0 {
            return Err(ConfigError::InvalidJwksCache(format!(
                "{ENV_JWKS_FETCH_TIMEOUT_SECONDS} must be greater than 0"
            )));
        }

        if self.jwks_cache_duration_seconds > 0
            && self.jwks_refresh_padding_seconds >= self.jwks_cache_duration_seconds
        {
            return Err(ConfigError::InvalidJwksCache(format!(
                "{ENV_JWKS_REFRESH_PADDING_SECONDS} ({}) must be less than {ENV_JWKS_CACHE_DURATION_SECONDS} ({})",
                self.jwks_refresh_padding_seconds, self.jwks_cache_duration_seconds
            )));
        }

        if self.jwt_leeway_seconds > MAX_CLOCK_SKEW.as_secs() {
            return Err(ConfigError::InvalidJwtLeeway(format!(
                "{ENV_JWT_LEEWAY_SECONDS} must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                self.jwt_leeway_seconds
            )));
        }

        Ok(())
    }

    /// Cache timing for the remote key-set strategy.
    pub fn cache_config(&self) -> KeySetCacheConfig {
        KeySetCacheConfig {
            cache_duration: Duration::from_secs(self.jwks_cache_duration_seconds),
            refresh_padding: Duration::from_secs(self.jwks_refresh_padding_seconds),
            fetch_timeout: Duration::from_secs(self.jwks_fetch_timeout_seconds),
        }
    }

    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.jwt_leeway_seconds)
    }
}

fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    error: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    match non_empty(vars, name) {
        Some(value) => value.parse().map_err(|e| {
            error(format!(
                "{name} must be a non-negative integer, got '{value}': {e}"
            ))
        }),
        None => Ok(default),
    }
}
