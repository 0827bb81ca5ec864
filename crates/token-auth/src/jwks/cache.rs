//! Remote key-set cache.
//!
//! Readers clone an `Arc<KeySetSnapshot>` out of a short read lock and verify
//! against it without holding anything. Refreshes are single-flight: the
//! refresh mutex is held across the fetch, and a caller that waited on it and
//! finds a newer generation reuses that snapshot instead of fetching again.
//! The network fetch never runs under the snapshot lock, so lookups against
//! the previous snapshot proceed while a refresh is in flight.
//!
//! # Refresh policy
//!
//! - A snapshot older than `cache_duration` is refreshed inline on next use
//!   (`cache_duration == 0` disables age-based expiry)
//! - Automatic fetches (expiry, unknown kid) are at least `refresh_padding`
//!   apart; a throttled caller gets the current snapshot, or
//!   `JwksClientError` if there is none
//! - [`RemoteKeySetCache::refresh`] ignores the throttle
//! - [`RemoteKeySetCache::spawn_refresh_task`] refreshes ahead of expiry

use crate::errors::AuthError;
use crate::jwks::{KeySetFetcher, KeySetSnapshot};
use crate::observability::metrics::{record_jwks_refresh, set_jwks_keys};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Default snapshot lifetime (5 minutes).
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(300);

/// Default minimum interval between automatic fetches.
pub const DEFAULT_REFRESH_PADDING: Duration = Duration::from_secs(30);

/// Default bound on a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Floor for the background task's retry delay after a failed fetch.
const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);

// =============================================================================
// Endpoint
// =============================================================================

/// Validated location of a key-set document: an absolute `http`/`https` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteKeySetEndpoint {
    url: String,
}

impl RemoteKeySetEndpoint {
    /// # Errors
    ///
    /// Returns `AuthError::InvalidJwksEndpoint` for an empty, unparseable,
    /// non-HTTP(S) or host-less URL.
    pub fn new(url: impl Into<String>) -> Result<Self, AuthError> {
        let url = url.into();
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(AuthError::InvalidJwksEndpoint("URL is empty".to_string()));
        }

        let parsed = reqwest::Url::parse(trimmed)
            .map_err(|e| AuthError::InvalidJwksEndpoint(format!("{trimmed}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AuthError::InvalidJwksEndpoint(format!(
                "{trimmed}: scheme must be http or https"
            )));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(AuthError::InvalidJwksEndpoint(format!(
                "{trimmed}: missing host"
            )));
        }

        Ok(Self {
            url: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for RemoteKeySetEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Cache timing. `AuthConfig` guarantees `refresh_padding < cache_duration`
/// whenever `cache_duration > 0`, and a non-zero `fetch_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySetCacheConfig {
    /// Snapshot lifetime; zero means snapshots never expire by age.
    pub cache_duration: Duration,
    /// Minimum interval between automatic fetches, and how far ahead of
    /// expiry the background task refreshes.
    pub refresh_padding: Duration,
    /// Upper bound on one fetch.
    pub fetch_timeout: Duration,
}

impl Default for KeySetCacheConfig {
    fn default() -> Self {
        Self {
            cache_duration: DEFAULT_CACHE_DURATION,
            refresh_padding: DEFAULT_REFRESH_PADDING,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl KeySetCacheConfig {
    /// Delay between background refreshes:
    /// `max(cache_duration - refresh_padding, refresh_padding)`.
    pub fn refresh_interval(&self) -> Duration {
        self.cache_duration
            .saturating_sub(self.refresh_padding)
            .max(self.refresh_padding)
    }

    /// Delay before the background task retries a failed fetch.
    pub fn retry_delay(&self) -> Duration {
        self.refresh_padding.max(MIN_RETRY_DELAY)
    }
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshReason {
    Expired,
    UnknownKid,
    Forced,
}

impl RefreshReason {
    fn as_str(self) -> &'static str {
        match self {
            RefreshReason::Expired => "expired",
            RefreshReason::UnknownKid => "unknown_kid",
            RefreshReason::Forced => "forced",
        }
    }
}

/// Guarded by the refresh mutex.
#[derive(Debug, Default)]
struct RefreshState {
    last_attempt: Option<Instant>,
    generation: u64,
}

/// Fetches, caches and refreshes one remote key set.
pub struct RemoteKeySetCache {
    endpoint: RemoteKeySetEndpoint,
    fetcher: Arc<dyn KeySetFetcher>,
    config: KeySetCacheConfig,
    snapshot: RwLock<Option<Arc<KeySetSnapshot>>>,
    refresh_state: Mutex<RefreshState>,
}

impl RemoteKeySetCache {
    /// Register `endpoint` with an empty cache. Nothing is fetched until the
    /// first lookup, refresh or background tick.
    pub fn new(
        endpoint: RemoteKeySetEndpoint,
        fetcher: Arc<dyn KeySetFetcher>,
        config: KeySetCacheConfig,
    ) -> Self {
        Self {
            endpoint,
            fetcher,
            config,
            snapshot: RwLock::new(None),
            refresh_state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn endpoint(&self) -> &RemoteKeySetEndpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &KeySetCacheConfig {
        &self.config
    }

    /// The current snapshot, fresh or not, without fetching.
    pub async fn current(&self) -> Option<Arc<KeySetSnapshot>> {
        self.snapshot.read().await.clone()
    }

    fn is_fresh(&self, snapshot: &KeySetSnapshot) -> bool {
        self.config.cache_duration.is_zero() || snapshot.age() < self.config.cache_duration
    }

    /// A usable snapshot, fetching inline if there is none or it expired.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::JwksClientError` if a fetch was needed and failed,
    /// timed out or was throttled with no snapshot to fall back on.
    pub async fn get_snapshot(&self) -> Result<Arc<KeySetSnapshot>, AuthError> {
        let current = self.current().await;
        if let Some(snapshot) = &current {
            if self.is_fresh(snapshot) {
                return Ok(Arc::clone(snapshot));
            }
        }

        let observed = current.as_ref().map(|s| s.generation());
        self.refresh_with(RefreshReason::Expired, observed).await
    }

    /// Throttled refresh after a token named a kid missing from the snapshot
    /// with generation `observed`.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteKeySetCache::get_snapshot`].
    pub async fn refresh_for_unknown_kid(
        &self,
        observed: u64,
    ) -> Result<Arc<KeySetSnapshot>, AuthError> {
        self.refresh_with(RefreshReason::UnknownKid, Some(observed))
            .await
    }

    /// Force an out-of-band fetch, ignoring the throttle. On failure the
    /// previous snapshot stays in place.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::JwksClientError` if the fetch fails or times out.
    pub async fn refresh(&self) -> Result<Arc<KeySetSnapshot>, AuthError> {
        let observed = self.current().await.map(|s| s.generation());
        self.refresh_with(RefreshReason::Forced, observed).await
    }

    #[instrument(skip_all, fields(reason = reason.as_str()))]
    async fn refresh_with(
        &self,
        reason: RefreshReason,
        observed: Option<u64>,
    ) -> Result<Arc<KeySetSnapshot>, AuthError> {
        let mut state = self.refresh_state.lock().await;

        // Someone else refreshed while we waited for the guard
        let current = self.current().await;
        if let Some(snapshot) = &current {
            let newer = observed.map_or(true, |seen| snapshot.generation() > seen);
            if newer && self.is_fresh(snapshot) {
                return Ok(Arc::clone(snapshot));
            }
        }

        if reason != RefreshReason::Forced {
            if let Some(last_attempt) = state.last_attempt {
                if last_attempt.elapsed() < self.config.refresh_padding {
                    tracing::debug!(
                        target: "auth.jwks",
                        reason = reason.as_str(),
                        "Key set refresh throttled"
                    );
                    // Throttling never extends a snapshot past its lifetime
                    return current.filter(|s| self.is_fresh(s)).ok_or_else(|| {
                        AuthError::JwksClientError("key set refresh throttled".to_string())
                    });
                }
            }
        }

        let started = Instant::now();
        let fetched = tokio::time::timeout(
            self.config.fetch_timeout,
            self.fetcher.fetch(self.endpoint.as_str()),
        )
        .await;

        // Only completed attempts count toward the throttle; a dropped fetch
        // never reaches this point
        state.last_attempt = Some(started);

        let set = match fetched {
            Ok(Ok(set)) => set,
            Ok(Err(e)) => {
                record_jwks_refresh("error");
                tracing::warn!(
                    target: "auth.jwks",
                    reason = reason.as_str(),
                    error = %e,
                    "Key set refresh failed"
                );
                return Err(e);
            }
            Err(_) => {
                record_jwks_refresh("timeout");
                tracing::warn!(
                    target: "auth.jwks",
                    reason = reason.as_str(),
                    timeout_ms = self.config.fetch_timeout.as_millis(),
                    "Key set refresh timed out"
                );
                return Err(AuthError::JwksClientError(
                    "key set fetch timed out".to_string(),
                ));
            }
        };

        state.generation += 1;
        let snapshot = Arc::new(KeySetSnapshot::from_jwk_set(&set, state.generation));
        *self.snapshot.write().await = Some(Arc::clone(&snapshot));

        record_jwks_refresh("success");
        set_jwks_keys(snapshot.len());
        tracing::info!(
            target: "auth.jwks",
            reason = reason.as_str(),
            generation = snapshot.generation(),
            key_count = snapshot.len(),
            kids = ?snapshot.kids(),
            "Key set refreshed"
        );

        Ok(snapshot)
    }

    /// Start the background refresher.
    ///
    /// Refreshes `refresh_interval()` after the last successful fetch and
    /// retries failures after `retry_delay()`. Stops when `cancel` fires,
    /// abandoning any in-flight fetch. Returns `None` when
    /// `cache_duration == 0`: such snapshots never expire.
    pub fn spawn_refresh_task(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if self.config.cache_duration.is_zero() {
            tracing::debug!(target: "auth.jwks", "Key set never expires, background refresh disabled");
            return None;
        }

        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            cache.refresh_loop(cancel).await;
        }))
    }

    #[instrument(skip_all, name = "auth.jwks.refresh_task")]
    async fn refresh_loop(&self, cancel: CancellationToken) {
        let interval = self.config.refresh_interval();
        let retry_delay = self.config.retry_delay();

        tracing::info!(
            target: "auth.jwks",
            endpoint = %self.endpoint,
            interval_secs = interval.as_secs(),
            "Starting key set refresh task"
        );

        let mut last_failed = false;
        loop {
            let wait = if last_failed {
                retry_delay
            } else {
                match self.current().await {
                    Some(snapshot) => interval.saturating_sub(snapshot.age()),
                    None => Duration::ZERO,
                }
            };

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = cancel.cancelled() => break,
            }

            tokio::select! {
                result = self.refresh() => {
                    last_failed = result.is_err();
                    if last_failed {
                        tracing::warn!(
                            target: "auth.jwks",
                            retry_ms = retry_delay.as_millis(),
                            "Background key set refresh failed, will retry"
                        );
                    }
                }
                () = cancel.cancelled() => break,
            }
        }

        tracing::info!(target: "auth.jwks", "Key set refresh task stopped");
    }
}

impl fmt::Debug for RemoteKeySetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKeySetCache")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
