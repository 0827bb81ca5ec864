//! Fetching the key-set document.
//!
//! The cache talks to the network only through [`KeySetFetcher`], so tests
//! can substitute a scripted fetcher for the HTTP one.

use crate::errors::AuthError;
use crate::jwks::JwkSet;
use async_trait::async_trait;
use std::time::Duration;
use tracing::instrument;

/// Source of key-set documents.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    /// Fetch and parse the key set published at `url`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::JwksClientError` on transport, status or parse failure.
    async fn fetch(&self, url: &str) -> Result<JwkSet, AuthError>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpKeySetFetcher {
    http_client: reqwest::Client,
}

impl HttpKeySetFetcher {
    /// Build the HTTP client with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::JwksClientError` if the client cannot be built
    /// (e.g. the TLS backend fails to initialize).
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!(target: "auth.jwks", error = %e, "Failed to build HTTP client");
                AuthError::JwksClientError("failed to build HTTP client".to_string())
            })?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    #[instrument(skip_all)]
    async fn fetch(&self, url: &str) -> Result<JwkSet, AuthError> {
        tracing::debug!(target: "auth.jwks", url = %url, "Fetching key set");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "auth.jwks", error = %e, "Failed to fetch key set");
            AuthError::JwksClientError("key set endpoint unreachable".to_string())
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "auth.jwks",
                status = %response.status(),
                "Key set endpoint returned error"
            );
            return Err(AuthError::JwksClientError(format!(
                "key set endpoint returned {}",
                response.status().as_u16()
            )));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!(target: "auth.jwks", error = %e, "Failed to parse key set response");
            AuthError::JwksClientError("invalid key set document".to_string())
        })
    }
}
