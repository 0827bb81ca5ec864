//! Shared-secret (HMAC) strategy.

use crate::errors::AuthError;
use crate::models::TokenValidationResult;
use crate::strategies::{
    ensure_algorithm, into_result, read_header, verify_token, AuthStrategy, DEFAULT_LEEWAY,
    SECRET_PRIORITY, SECRET_STRATEGY,
};
use async_trait::async_trait;
use common::jwt::AlgorithmFamily;
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::DecodingKey;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Validates `HS256`/`HS384`/`HS512` tokens against a shared secret.
///
/// Configured iff a non-empty secret was supplied. Lowest priority.
pub struct SecretStrategy {
    key: Option<DecodingKey>,
    leeway: Duration,
}

impl SecretStrategy {
    /// `None` or an empty secret yields an unconfigured strategy.
    pub fn new(secret: Option<SecretString>) -> Self {
        let key = secret
            .filter(|s| !s.expose_secret().is_empty())
            .map(|s| DecodingKey::from_secret(s.expose_secret().as_bytes()));

        Self {
            key,
            leeway: DEFAULT_LEEWAY,
        }
    }

    /// Tolerance for `exp` and `nbf`; also widens the `iat` skew allowance.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }
}

#[async_trait]
impl AuthStrategy for SecretStrategy {
    fn name(&self) -> &str {
        SECRET_STRATEGY
    }

    fn priority(&self) -> i32 {
        SECRET_PRIORITY
    }

    fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    #[instrument(skip_all, name = "auth.strategy.secret")]
    async fn validate_token(&self, token: &str) -> TokenValidationResult {
        let Some(key) = &self.key else {
            return TokenValidationResult::invalid(AuthError::ProviderNotConfigured);
        };

        let outcome = read_header(token).and_then(|header| {
            ensure_algorithm(header.alg, AlgorithmFamily::Hmac.algorithms())?;
            verify_token(token, header.alg, key, self.leeway)
        });

        into_result(SECRET_STRATEGY, outcome)
    }
}

/// The secret never appears in Debug output.
impl fmt::Debug for SecretStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStrategy")
            .field("configured", &self.is_configured())
            .field("leeway", &self.leeway)
            .finish()
    }
}
