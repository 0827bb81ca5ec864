//! Authentication strategies.
//!
//! Each strategy validates a bearer token against one kind of key material:
//!
//! | Strategy | Name | Priority | Key material |
//! |----------|------|----------|--------------|
//! | [`PrivateKeyStrategy`] | `PrivateKey` | 300 | Local private key file (public half) |
//! | [`RemoteKeySetStrategy`] | `JWKs` | 200 | Remote key set (JWKS) |
//! | [`SecretStrategy`] | `Secret` | 100 | Shared HMAC secret |
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (via `common::jwt::inspect_header`)
//! - The header algorithm must belong to the key's family; HMAC tokens are
//!   never checked against public keys and vice versa
//! - `exp` and `nbf` are enforced when present, with no leeway by default
//! - `iat` may not be further in the future than `DEFAULT_CLOCK_SKEW` (or the
//!   leeway, if larger)
//! - Failure details are logged at debug level, never returned verbatim

mod private_key;
mod remote_key_set;
mod secret;

pub use private_key::PrivateKeyStrategy;
pub use remote_key_set::RemoteKeySetStrategy;
pub use secret::SecretStrategy;

use crate::errors::AuthError;
use crate::models::{TokenClaims, TokenValidationResult};
use async_trait::async_trait;
use common::jwt::{inspect_header, validate_iat, JwtValidationError, DEFAULT_CLOCK_SKEW};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Header, Validation};
use std::collections::HashSet;
use std::time::Duration;

pub const PRIVATE_KEY_STRATEGY: &str = "PrivateKey";
pub const REMOTE_KEY_SET_STRATEGY: &str = "JWKs";
pub const SECRET_STRATEGY: &str = "Secret";

pub const PRIVATE_KEY_PRIORITY: i32 = 300;
pub const REMOTE_KEY_SET_PRIORITY: i32 = 200;
pub const SECRET_PRIORITY: i32 = 100;

/// Default tolerance for `exp` and `nbf` checks.
pub const DEFAULT_LEEWAY: Duration = Duration::ZERO;

/// Detail carried by `TokenValidation` when no key produced a matching signature.
pub(crate) const SIGNATURE_MISMATCH: &str = "signature mismatch";

/// One way of validating bearer tokens.
///
/// `validate_token` never fails: every outcome, including an unconfigured
/// strategy, is reported through the returned [`TokenValidationResult`].
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Stable identifier, used in logs, metrics and results.
    fn name(&self) -> &str;

    /// Higher values are tried first.
    fn priority(&self) -> i32;

    /// Whether this strategy received the key material it needs.
    fn is_configured(&self) -> bool;

    async fn validate_token(&self, token: &str) -> TokenValidationResult;
}

// =============================================================================
// Shared validation
// =============================================================================

/// Decode the header without verifying anything.
pub(crate) fn read_header(token: &str) -> Result<Header, AuthError> {
    inspect_header(token).map_err(|e| {
        tracing::debug!(target: "auth.strategy", error = ?e, "Token header rejected");
        match e {
            JwtValidationError::TokenTooLarge | JwtValidationError::MalformedToken => {
                AuthError::InvalidTokenFormat
            }
            JwtValidationError::IatTooFarInFuture => {
                AuthError::TokenValidation("token issued in the future".to_string())
            }
        }
    })
}

/// Reject tokens whose header algorithm this key cannot check.
pub(crate) fn ensure_algorithm(alg: Algorithm, accepted: &[Algorithm]) -> Result<(), AuthError> {
    if accepted.contains(&alg) {
        Ok(())
    } else {
        tracing::debug!(
            target: "auth.strategy",
            alg = ?alg,
            accepted = ?accepted,
            "Token algorithm does not match key"
        );
        Err(AuthError::InvalidTokenSignature)
    }
}

/// Verify the signature with `key` and check the time-based claims.
///
/// `alg` must already have been checked against the key with
/// [`ensure_algorithm`].
pub(crate) fn verify_token(
    token: &str,
    alg: Algorithm,
    key: &DecodingKey,
    leeway: Duration,
) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::new(alg);
    // exp is optional; checked only when present
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.leeway = leeway.as_secs();

    let claims = decode::<TokenClaims>(token, key, &validation)
        .map_err(|e| {
            tracing::debug!(target: "auth.strategy", error = %e, "Token verification failed");
            map_jwt_error(e.kind())
        })?
        .claims;

    if let Some(iat) = claims.iat {
        validate_iat(iat, DEFAULT_CLOCK_SKEW.max(leeway))
            .map_err(|_| AuthError::TokenValidation("token issued in the future".to_string()))?;
    }

    Ok(claims)
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::InvalidTokenFormat
        }
        ErrorKind::InvalidAlgorithm => AuthError::InvalidTokenSignature,
        ErrorKind::InvalidSignature => AuthError::TokenValidation(SIGNATURE_MISMATCH.to_string()),
        ErrorKind::ExpiredSignature => AuthError::TokenValidation("token expired".to_string()),
        ErrorKind::ImmatureSignature => {
            AuthError::TokenValidation("token not yet valid".to_string())
        }
        ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::RsaFailedSigning => AuthError::TokenValidation("key rejected".to_string()),
        _ => AuthError::TokenValidation("invalid claims".to_string()),
    }
}

pub(crate) fn is_signature_mismatch(err: &AuthError) -> bool {
    matches!(err, AuthError::TokenValidation(detail) if detail == SIGNATURE_MISMATCH)
}

/// Turn a verification outcome into the result a strategy reports.
pub(crate) fn into_result(strategy: &str, outcome: Result<TokenClaims, AuthError>) -> TokenValidationResult {
    match outcome {
        Ok(claims) => {
            tracing::debug!(target: "auth.strategy", strategy = strategy, "Token accepted");
            TokenValidationResult::valid(claims.sub.unwrap_or_default())
        }
        Err(e) => {
            tracing::debug!(
                target: "auth.strategy",
                strategy = strategy,
                error_type = e.error_type(),
                "Token rejected"
            );
            TokenValidationResult::invalid(e)
        }
    }
}
