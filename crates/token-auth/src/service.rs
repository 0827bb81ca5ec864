//! Authentication service.
//!
//! Composes the configured strategies, orders them by priority and offers
//! each token to them in turn until one accepts it.
//!
//! # Authorization Header Format
//!
//! ```text
//! Authorization: Bearer <token>
//! ```

use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::jwks::RemoteKeySetCache;
use crate::models::AuthenticationResult;
use crate::observability::metrics::{record_strategy_failure, record_token_validation};
use crate::strategies::{AuthStrategy, PrivateKeyStrategy, RemoteKeySetStrategy, SecretStrategy};
use common::jwt::MAX_JWT_SIZE_BYTES;
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const BEARER_PREFIX: &str = "Bearer ";

/// Priority-ordered chain of authentication strategies.
///
/// The chain is fixed at construction. The service is `Send + Sync` and is
/// meant to be shared behind an `Arc` by concurrent request handlers.
pub struct AuthService {
    strategies: Vec<Arc<dyn AuthStrategy>>,
    key_set_cache: Option<Arc<RemoteKeySetCache>>,
}

impl AuthService {
    /// Build a service from already constructed strategies.
    ///
    /// Unconfigured strategies are dropped; the rest are ordered by
    /// descending priority (ties keep their given order).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoValidProvider` if no strategy is configured.
    pub fn new(strategies: Vec<Arc<dyn AuthStrategy>>) -> Result<Self, AuthError> {
        let mut strategies: Vec<_> = strategies
            .into_iter()
            .filter(|s| {
                if !s.is_configured() {
                    tracing::debug!(target: "auth.service", strategy = s.name(), "Skipping unconfigured strategy");
                }
                s.is_configured()
            })
            .collect();

        if strategies.is_empty() {
            tracing::error!(target: "auth.service", "No authentication strategy configured");
            return Err(AuthError::NoValidProvider);
        }

        strategies.sort_by_key(|s| Reverse(s.priority()));

        let service = Self {
            strategies,
            key_set_cache: None,
        };

        tracing::info!(
            target: "auth.service",
            providers = ?service.configured_providers(),
            "Authentication service initialized"
        );

        Ok(service)
    }

    /// Build the three standard strategies from configuration.
    ///
    /// # Errors
    ///
    /// Any strategy construction error (key file, endpoint, HTTP client), or
    /// `NoValidProvider` if nothing is configured.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let leeway = config.leeway();

        let private_key =
            PrivateKeyStrategy::new(config.private_key_file.as_deref())?.with_leeway(leeway);
        let remote_key_set =
            RemoteKeySetStrategy::new(config.jwks_url.as_deref(), config.cache_config())?
                .with_leeway(leeway);
        let secret = SecretStrategy::new(config.shared_secret.clone()).with_leeway(leeway);

        let key_set_cache = remote_key_set.cache().cloned();
        let service = Self::new(vec![
            Arc::new(private_key),
            Arc::new(remote_key_set),
            Arc::new(secret),
        ])?;

        Ok(match key_set_cache {
            Some(cache) => service.with_key_set_cache(cache),
            None => service,
        })
    }

    /// Attach the remote key-set cache used by [`AuthService::refresh_key_set`]
    /// and [`AuthService::spawn_key_set_refresher`].
    #[must_use]
    pub fn with_key_set_cache(mut self, cache: Arc<RemoteKeySetCache>) -> Self {
        self.key_set_cache = Some(cache);
        self
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Validate a bearer token against the strategy chain.
    ///
    /// Never fails: rejection is reported in the returned result, carrying
    /// the last strategy failure (or `AllProvidersFailed`).
    #[instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> AuthenticationResult {
        let started = Instant::now();
        let result = self.arbitrate(token).await;
        record_token_validation(result.strategy_name(), result.is_valid(), started.elapsed());
        result
    }

    async fn arbitrate(&self, token: &str) -> AuthenticationResult {
        if token.is_empty() {
            tracing::debug!(target: "auth.service", "Token rejected: empty");
            return AuthenticationResult::rejected(AuthError::InvalidTokenFormat);
        }
        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "auth.service",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return AuthenticationResult::rejected(AuthError::InvalidTokenFormat);
        }

        let mut last_failure = None;
        for strategy in &self.strategies {
            let result = strategy.validate_token(token).await;

            if result.is_valid() {
                tracing::debug!(target: "auth.service", strategy = strategy.name(), "Token accepted");
                return AuthenticationResult::accepted(Arc::clone(strategy), result);
            }

            let failure = result
                .failure()
                .cloned()
                .unwrap_or(AuthError::AllProvidersFailed);
            record_strategy_failure(strategy.name(), failure.error_type());
            tracing::debug!(
                target: "auth.service",
                strategy = strategy.name(),
                error_type = failure.error_type(),
                "Strategy rejected token"
            );
            last_failure = Some(failure);
        }

        AuthenticationResult::rejected(last_failure.unwrap_or(AuthError::AllProvidersFailed))
    }

    /// Like [`AuthService::validate_token`], but gives up with `Cancelled`
    /// once `cancel` fires. An abandoned key-set fetch leaves the cached
    /// snapshot as it was.
    pub async fn validate_token_cancellable(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> AuthenticationResult {
        let started = Instant::now();
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(target: "auth.service", "Token validation cancelled");
                record_token_validation(None, false, started.elapsed());
                AuthenticationResult::rejected(AuthError::Cancelled)
            }
            result = self.validate_token(token) => result,
        }
    }

    /// Extract the bearer token from an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `MissingAuthorizationHeader` for an empty value
    /// - `InvalidAuthorizationFormat` if the value does not start with
    ///   `"Bearer "` (case-sensitive) or carries no token
    pub fn extract_token_from_header<'a>(&self, header_value: &'a str) -> Result<&'a str, AuthError> {
        extract_bearer_token(header_value)
    }

    /// Extract and validate in one step; extraction errors are reported
    /// in the result.
    pub async fn authenticate_header(&self, header_value: &str) -> AuthenticationResult {
        match extract_bearer_token(header_value) {
            Ok(token) => self.validate_token(token).await,
            Err(e) => {
                record_token_validation(None, false, std::time::Duration::ZERO);
                AuthenticationResult::rejected(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Names of the configured strategies, highest priority first.
    pub fn configured_providers(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn provider_count(&self) -> usize {
        self.strategies.len()
    }

    /// The strategy chain in trial order.
    pub fn strategies(&self) -> &[Arc<dyn AuthStrategy>] {
        &self.strategies
    }

    pub fn key_set_cache(&self) -> Option<&Arc<RemoteKeySetCache>> {
        self.key_set_cache.as_ref()
    }

    // -------------------------------------------------------------------------
    // Remote key set management
    // -------------------------------------------------------------------------

    /// Force a key-set refresh. A no-op without a remote key set.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::JwksClientError` if the fetch fails; the previous
    /// snapshot stays in use.
    pub async fn refresh_key_set(&self) -> Result<(), AuthError> {
        match &self.key_set_cache {
            Some(cache) => cache.refresh().await.map(|_| ()),
            None => {
                tracing::debug!(target: "auth.service", "No remote key set configured, nothing to refresh");
                Ok(())
            }
        }
    }

    /// Start the background key-set refresher, if there is a remote key set
    /// with a non-zero cache duration.
    pub fn spawn_key_set_refresher(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        self.key_set_cache
            .as_ref()
            .and_then(|cache| cache.spawn_refresh_task(cancel))
    }
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("providers", &self.configured_providers())
            .field("key_set_cache", &self.key_set_cache)
            .finish()
    }
}

/// Extract the token from `Bearer <token>`, trimming surrounding whitespace.
///
/// # Errors
///
/// See [`AuthService::extract_token_from_header`].
pub fn extract_bearer_token(header_value: &str) -> Result<&str, AuthError> {
    if header_value.is_empty() {
        tracing::debug!(target: "auth.service", "Missing Authorization header");
        return Err(AuthError::MissingAuthorizationHeader);
    }

    let token = header_value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "auth.service", "Invalid Authorization header format");
            AuthError::InvalidAuthorizationFormat
        })?;

    Ok(token)
}
