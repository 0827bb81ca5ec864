//! Authentication error types.
//!
//! One enum covers both construction-time failures (returned from
//! constructors with `?`, fatal to startup) and per-request failures (carried
//! inside a `TokenValidationResult`, never raised). Display strings are terse;
//! details meant for operators are logged where the error is produced.

use thiserror::Error;

/// Token authentication error type.
///
/// Maps to HTTP status codes for the transport layer via [`AuthError::status_code`]:
/// - Per-request validation failures: 401 Unauthorized
/// - Remote key-set fetch failure: 503 Service Unavailable
/// - Configuration / construction failures: 500 Internal Server Error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    // ---------------------------------------------------------------------
    // Construction-time
    // ---------------------------------------------------------------------
    #[error("no valid authentication provider configured")]
    NoValidProvider,

    #[error("invalid private key file: path is empty")]
    InvalidPrivateKeyFile,

    #[error("private key file not found: {0}")]
    PrivateKeyFileNotFound(String),

    #[error("failed to read private key file: {0}")]
    PrivateKeyFileReadError(String),

    #[error("failed to parse private key: {0}")]
    PrivateKeyParseError(String),

    #[error("invalid JWKs endpoint: {0}")]
    InvalidJwksEndpoint(String),

    #[error("JWKs client error: {0}")]
    JwksClientError(String),

    // ---------------------------------------------------------------------
    // Per-request
    // ---------------------------------------------------------------------
    #[error("authentication provider not configured")]
    ProviderNotConfigured,

    #[error("invalid token format")]
    InvalidTokenFormat,

    #[error("invalid token signature")]
    InvalidTokenSignature,

    #[error("token validation failed: {0}")]
    TokenValidation(String),

    #[error("signing key not found")]
    KeyNotFound,

    #[error("all authentication providers failed")]
    AllProvidersFailed,

    #[error("missing authorization header")]
    MissingAuthorizationHeader,

    #[error("invalid authorization header format")]
    InvalidAuthorizationFormat,

    #[error("token validation cancelled")]
    Cancelled,
}

impl AuthError {
    /// Whether this error aborts service construction.
    ///
    /// `JwksClientError` counts as construction-time: it is fatal when raised
    /// from a constructor, and reported in-band when a per-request fetch fails.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            AuthError::NoValidProvider
                | AuthError::InvalidPrivateKeyFile
                | AuthError::PrivateKeyFileNotFound(_)
                | AuthError::PrivateKeyFileReadError(_)
                | AuthError::PrivateKeyParseError(_)
                | AuthError::InvalidJwksEndpoint(_)
                | AuthError::JwksClientError(_)
        )
    }

    /// Bounded label for metrics (`error_type`).
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthError::NoValidProvider => "no_valid_provider",
            AuthError::InvalidPrivateKeyFile => "invalid_private_key_file",
            AuthError::PrivateKeyFileNotFound(_) => "private_key_file_not_found",
            AuthError::PrivateKeyFileReadError(_) => "private_key_file_read_error",
            AuthError::PrivateKeyParseError(_) => "private_key_parse_error",
            AuthError::InvalidJwksEndpoint(_) => "invalid_jwks_endpoint",
            AuthError::JwksClientError(_) => "jwks_client_error",
            AuthError::ProviderNotConfigured => "provider_not_configured",
            AuthError::InvalidTokenFormat => "invalid_token_format",
            AuthError::InvalidTokenSignature => "invalid_token_signature",
            AuthError::TokenValidation(_) => "token_validation",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::AllProvidersFailed => "all_providers_failed",
            AuthError::MissingAuthorizationHeader => "missing_authorization_header",
            AuthError::InvalidAuthorizationFormat => "invalid_authorization_format",
            AuthError::Cancelled => "cancelled",
        }
    }

    /// Returns the HTTP status code the transport layer should use.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::JwksClientError(_) => 503,
            e if e.is_construction_error() => 500,
            _ => 401,
        }
    }
}
