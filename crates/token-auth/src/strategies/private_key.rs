//! Private-key strategy.
//!
//! The key file is loaded once at construction; tokens are verified against
//! the public half of the loaded key. Construction fails fast, so a
//! configured strategy always holds a usable key.

use crate::errors::AuthError;
use crate::keys::{KeyFormat, KeyFormatLoader, LoadedPrivateKey, PrivateKeyFile};
use crate::models::TokenValidationResult;
use crate::strategies::{
    ensure_algorithm, into_result, read_header, verify_token, AuthStrategy, DEFAULT_LEEWAY,
    PRIVATE_KEY_PRIORITY, PRIVATE_KEY_STRATEGY,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

struct LoadedKey {
    loaded: LoadedPrivateKey,
    decoding_key: DecodingKey,
}

/// Validates RSA (`RS*`/`PS*`) or P-256 (`ES256`) tokens against a local key.
///
/// Configured iff a non-empty key file path was supplied. Highest priority.
pub struct PrivateKeyStrategy {
    key: Option<LoadedKey>,
    leeway: Duration,
}

impl PrivateKeyStrategy {
    /// Load the key at `path` with the default format order.
    ///
    /// `None` or an empty path yields an unconfigured strategy.
    ///
    /// # Errors
    ///
    /// `PrivateKeyFileNotFound`, `PrivateKeyFileReadError` or
    /// `PrivateKeyParseError` from the loader.
    pub fn new(path: Option<&str>) -> Result<Self, AuthError> {
        Self::with_loader(path, &KeyFormatLoader::new())
    }

    /// Like [`PrivateKeyStrategy::new`] with an explicit format order.
    ///
    /// # Errors
    ///
    /// Same as [`PrivateKeyStrategy::new`].
    pub fn with_loader(path: Option<&str>, loader: &KeyFormatLoader) -> Result<Self, AuthError> {
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            return Ok(Self {
                key: None,
                leeway: DEFAULT_LEEWAY,
            });
        };

        let file = PrivateKeyFile::new(path)?;
        let loaded = loader.load(&file)?;
        Self::from_loaded(loaded)
    }

    /// Build from an already loaded key.
    ///
    /// # Errors
    ///
    /// `PrivateKeyParseError` if no verification key can be derived.
    pub fn from_loaded(loaded: LoadedPrivateKey) -> Result<Self, AuthError> {
        let decoding_key = loaded.key().decoding_key()?;

        tracing::info!(
            target: "auth.strategy",
            strategy = PRIVATE_KEY_STRATEGY,
            format = %loaded.format(),
            family = %loaded.key().family(),
            "Private key strategy configured"
        );

        Ok(Self {
            key: Some(LoadedKey {
                loaded,
                decoding_key,
            }),
            leeway: DEFAULT_LEEWAY,
        })
    }

    /// Tolerance for `exp` and `nbf`; also widens the `iat` skew allowance.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Format the key file was detected as.
    pub fn key_format(&self) -> Option<KeyFormat> {
        self.key.as_ref().map(|k| k.loaded.format())
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.key.as_ref().map(|k| k.loaded.loaded_at())
    }
}

#[async_trait]
impl AuthStrategy for PrivateKeyStrategy {
    fn name(&self) -> &str {
        PRIVATE_KEY_STRATEGY
    }

    fn priority(&self) -> i32 {
        PRIVATE_KEY_PRIORITY
    }

    fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    #[instrument(skip_all, name = "auth.strategy.private_key")]
    async fn validate_token(&self, token: &str) -> TokenValidationResult {
        let Some(key) = &self.key else {
            return TokenValidationResult::invalid(AuthError::ProviderNotConfigured);
        };

        let outcome = read_header(token).and_then(|header| {
            ensure_algorithm(header.alg, key.loaded.key().algorithms())?;
            verify_token(token, header.alg, &key.decoding_key, self.leeway)
        });

        into_result(PRIVATE_KEY_STRATEGY, outcome)
    }
}

impl fmt::Debug for PrivateKeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyStrategy")
            .field("key", &self.key.as_ref().map(|k| &k.loaded))
            .field("leeway", &self.leeway)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::keys::DEFAULT_FORMAT_ORDER;
    use auth_test_utils::{
        write_key_file, TestTokenBuilder, EC_PKCS8_PEM, EC_SEC1_PEM, OTHER_RSA_PKCS8_PEM,
        RSA_PKCS1_DER, RSA_PKCS1_PEM, RSA_PKCS8_PEM,
    };
    use jsonwebtoken::Algorithm;
    use tempfile::NamedTempFile;

    fn strategy_for(bytes: &[u8]) -> (PrivateKeyStrategy, NamedTempFile) {
        let file = write_key_file(bytes).unwrap();
        let strategy = PrivateKeyStrategy::new(file.path().to_str()).unwrap();
        (strategy, file)
    }

    #[test]
    fn test_identity() {
        let (s, _file) = strategy_for(RSA_PKCS8_PEM);
        assert_eq!(s.name(), "PrivateKey");
        assert_eq!(s.priority(), 300);
        assert!(s.is_configured());
        assert_eq!(s.key_format(), Some(KeyFormat::Pkcs8Pem));
        assert!(s.loaded_at().is_some());
    }

    #[test]
    fn test_missing_or_empty_path_is_unconfigured() {
        let s = PrivateKeyStrategy::new(None).unwrap();
        assert!(!s.is_configured());
        assert!(s.key_format().is_none());

        assert!(!PrivateKeyStrategy::new(Some("")).unwrap().is_configured());
    }

    #[test]
    fn test_construction_fails_fast() {
        let err = PrivateKeyStrategy::new(Some("/nonexistent/key.pem")).unwrap_err();
        assert!(matches!(err, AuthError::PrivateKeyFileNotFound(_)));

        let file = write_key_file(b"garbage").unwrap();
        let err = PrivateKeyStrategy::new(file.path().to_str()).unwrap_err();
        assert!(matches!(err, AuthError::PrivateKeyParseError(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_rejects() {
        let token = TestTokenBuilder::new().sign_rs256(RSA_PKCS1_PEM);

        let result = PrivateKeyStrategy::new(None).unwrap().validate_token(&token).await;

        assert_eq!(result.failure(), Some(&AuthError::ProviderNotConfigured));
    }

    #[tokio::test]
    async fn test_valid_rs256_token() {
        let (s, _file) = strategy_for(RSA_PKCS1_PEM);
        let token = TestTokenBuilder::new().for_subject("user-1").sign_rs256(RSA_PKCS8_PEM);

        let result = s.validate_token(&token).await;

        assert!(result.is_valid(), "{result:?}");
        assert_eq!(result.subject(), "user-1");
    }

    #[tokio::test]
    async fn test_der_key_file() {
        let (s, _file) = strategy_for(RSA_PKCS1_DER);
        assert_eq!(s.key_format(), Some(KeyFormat::RsaDer));

        let token = TestTokenBuilder::new().sign_rsa(Algorithm::PS256, RSA_PKCS1_PEM);
        assert!(s.validate_token(&token).await.is_valid());
    }

    #[tokio::test]
    async fn test_token_from_other_key() {
        let (s, _file) = strategy_for(RSA_PKCS8_PEM);
        let token = TestTokenBuilder::new().sign_rs256(OTHER_RSA_PKCS8_PEM);

        let result = s.validate_token(&token).await;

        assert!(matches!(result.failure(), Some(AuthError::TokenValidation(_))));
    }

    #[tokio::test]
    async fn test_hmac_token_is_wrong_family() {
        let (s, _file) = strategy_for(RSA_PKCS8_PEM);
        let token = TestTokenBuilder::new().sign_hs256("s3cret");

        let result = s.validate_token(&token).await;

        assert_eq!(result.failure(), Some(&AuthError::InvalidTokenSignature));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let (s, _file) = strategy_for(RSA_PKCS8_PEM);
        let token = TestTokenBuilder::new().expires_in(-3600).sign_rs256(RSA_PKCS8_PEM);

        let result = s.validate_token(&token).await;

        assert_eq!(
            result.failure(),
            Some(&AuthError::TokenValidation("token expired".to_string()))
        );
    }

    #[tokio::test]
    async fn test_ecdsa_key_with_explicit_formats() {
        let file = write_key_file(EC_SEC1_PEM).unwrap();
        let mut formats = DEFAULT_FORMAT_ORDER.to_vec();
        formats.push(KeyFormat::EcdsaPem);
        let loader = KeyFormatLoader::with_formats(formats);

        let s = PrivateKeyStrategy::with_loader(file.path().to_str(), &loader).unwrap();
        assert_eq!(s.key_format(), Some(KeyFormat::EcdsaPem));

        let token = TestTokenBuilder::new().for_subject("ec-user").sign_es256(EC_PKCS8_PEM);
        let result = s.validate_token(&token).await;
        assert!(result.is_valid(), "{result:?}");
        assert_eq!(result.subject(), "ec-user");

        let rsa_token = TestTokenBuilder::new().sign_rs256(RSA_PKCS8_PEM);
        assert_eq!(
            s.validate_token(&rsa_token).await.failure(),
            Some(&AuthError::InvalidTokenSignature)
        );
    }
}
