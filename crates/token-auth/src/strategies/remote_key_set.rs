//! Remote key-set (JWKS) strategy.

use crate::errors::AuthError;
use crate::jwks::{
    HttpKeySetFetcher, KeySetCacheConfig, KeySetFetcher, KeySetSnapshot, RemoteKeySetCache,
    RemoteKeySetEndpoint,
};
use crate::models::{TokenClaims, TokenValidationResult};
use crate::strategies::{
    ensure_algorithm, into_result, is_signature_mismatch, read_header, verify_token, AuthStrategy,
    DEFAULT_LEEWAY, REMOTE_KEY_SET_PRIORITY, REMOTE_KEY_SET_STRATEGY, SIGNATURE_MISMATCH,
};
use async_trait::async_trait;
use jsonwebtoken::Header;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Validates asymmetric tokens against keys published at a remote endpoint.
///
/// Configured iff a non-empty endpoint URL was supplied.
pub struct RemoteKeySetStrategy {
    cache: Option<Arc<RemoteKeySetCache>>,
    leeway: Duration,
}

impl RemoteKeySetStrategy {
    /// Register `url` with a new cache backed by the HTTP fetcher.
    ///
    /// `None` or an empty URL yields an unconfigured strategy. Nothing is
    /// fetched until the first validation or refresh.
    ///
    /// # Errors
    ///
    /// - `InvalidJwksEndpoint` if the URL is not an absolute http(s) URL
    /// - `JwksClientError` if the HTTP client cannot be built
    pub fn new(url: Option<&str>, config: KeySetCacheConfig) -> Result<Self, AuthError> {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return Ok(Self::unconfigured());
        };

        let endpoint = RemoteKeySetEndpoint::new(url)?;
        let fetcher = HttpKeySetFetcher::new(config.fetch_timeout)?;
        Ok(Self::with_endpoint(endpoint, Arc::new(fetcher), config))
    }

    /// Register `url` with a caller-supplied fetcher.
    ///
    /// # Errors
    ///
    /// `InvalidJwksEndpoint` if the URL is not an absolute http(s) URL.
    pub fn with_fetcher(
        url: &str,
        fetcher: Arc<dyn KeySetFetcher>,
        config: KeySetCacheConfig,
    ) -> Result<Self, AuthError> {
        let endpoint = RemoteKeySetEndpoint::new(url)?;
        Ok(Self::with_endpoint(endpoint, fetcher, config))
    }

    fn with_endpoint(
        endpoint: RemoteKeySetEndpoint,
        fetcher: Arc<dyn KeySetFetcher>,
        config: KeySetCacheConfig,
    ) -> Self {
        tracing::info!(
            target: "auth.strategy",
            strategy = REMOTE_KEY_SET_STRATEGY,
            endpoint = %endpoint,
            cache_duration_secs = config.cache_duration.as_secs(),
            refresh_padding_secs = config.refresh_padding.as_secs(),
            "Remote key set strategy configured"
        );

        Self {
            cache: Some(Arc::new(RemoteKeySetCache::new(endpoint, fetcher, config))),
            leeway: DEFAULT_LEEWAY,
        }
    }

    fn unconfigured() -> Self {
        Self {
            cache: None,
            leeway: DEFAULT_LEEWAY,
        }
    }

    /// Tolerance for `exp` and `nbf`; also widens the `iat` skew allowance.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// The key-set cache, when configured.
    pub fn cache(&self) -> Option<&Arc<RemoteKeySetCache>> {
        self.cache.as_ref()
    }

    async fn verify(&self, cache: &RemoteKeySetCache, token: &str) -> Result<TokenClaims, AuthError> {
        let header = read_header(token)?;
        let snapshot = cache.get_snapshot().await?;

        match header.kid.as_deref() {
            Some(kid) => self.verify_with_kid(cache, snapshot, &header, kid, token).await,
            None => self.verify_with_any(&snapshot, &header, token),
        }
    }

    async fn verify_with_kid(
        &self,
        cache: &RemoteKeySetCache,
        snapshot: Arc<KeySetSnapshot>,
        header: &Header,
        kid: &str,
        token: &str,
    ) -> Result<TokenClaims, AuthError> {
        let snapshot = if snapshot.get(kid).is_some() {
            snapshot
        } else {
            tracing::debug!(
                target: "auth.strategy",
                kid = %kid,
                generation = snapshot.generation(),
                "Key ID not in key set, requesting refresh"
            );
            cache.refresh_for_unknown_kid(snapshot.generation()).await?
        };

        let Some(key) = snapshot.get(kid) else {
            tracing::debug!(target: "auth.strategy", kid = %kid, "Key ID not found after refresh");
            return Err(AuthError::KeyNotFound);
        };

        ensure_algorithm(header.alg, key.algorithms())?;
        verify_token(token, header.alg, key.decoding_key(), self.leeway)
    }

    /// No kid: try every key that accepts the header algorithm. A failure
    /// other than a signature mismatch means the signature verified and the
    /// claims did not, so it is reported straight away.
    fn verify_with_any(
        &self,
        snapshot: &KeySetSnapshot,
        header: &Header,
        token: &str,
    ) -> Result<TokenClaims, AuthError> {
        let mut tried = 0usize;
        for key in snapshot.candidates(header.alg) {
            tried += 1;
            match verify_token(token, header.alg, key.decoding_key(), self.leeway) {
                Ok(claims) => return Ok(claims),
                Err(e) if is_signature_mismatch(&e) => {}
                Err(e) => return Err(e),
            }
        }

        if tried == 0 {
            tracing::debug!(
                target: "auth.strategy",
                alg = ?header.alg,
                key_count = snapshot.len(),
                "No key in key set accepts token algorithm"
            );
            return Err(if snapshot.is_empty() {
                AuthError::KeyNotFound
            } else {
                AuthError::InvalidTokenSignature
            });
        }

        Err(AuthError::TokenValidation(SIGNATURE_MISMATCH.to_string()))
    }
}

#[async_trait]
impl AuthStrategy for RemoteKeySetStrategy {
    fn name(&self) -> &str {
        REMOTE_KEY_SET_STRATEGY
    }

    fn priority(&self) -> i32 {
        REMOTE_KEY_SET_PRIORITY
    }

    fn is_configured(&self) -> bool {
        self.cache.is_some()
    }

    #[instrument(skip_all, name = "auth.strategy.jwks")]
    async fn validate_token(&self, token: &str) -> TokenValidationResult {
        let Some(cache) = &self.cache else {
            return TokenValidationResult::invalid(AuthError::ProviderNotConfigured);
        };

        let outcome = self.verify(cache, token).await;
        into_result(REMOTE_KEY_SET_STRATEGY, outcome)
    }
}

impl fmt::Debug for RemoteKeySetStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKeySetStrategy")
            .field("cache", &self.cache)
            .field("leeway", &self.leeway)
            .finish()
    }
}
