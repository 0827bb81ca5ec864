//! JWT utilities shared by the token-auth crates.
//!
//! This module provides the pre-verification helpers every validation path
//! needs:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Header inspection (algorithm and key ID) without signature verification
//! - Algorithm family classification (HMAC, RSA, ECDSA, EdDSA)
//! - iat validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Header inspection never trusts the token: the algorithm family is only
//!   used to reject tokens that cannot possibly match a configured key
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{inspect_header, validate_iat, AlgorithmFamily, DEFAULT_CLOCK_SKEW};
//!
//! let header = inspect_header(token)?;
//! if AlgorithmFamily::of(header.alg) != AlgorithmFamily::Hmac {
//!     return Err("wrong algorithm family");
//! }
//!
//! // After signature verification, validate iat
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, Header};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// - Typical bearer tokens are 200-1500 bytes (RSA signatures are the largest)
/// - 8KB allows for generous custom claims while bounding decode work
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Configuration values above this are rejected at startup.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before verification.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Algorithm Families
// =============================================================================

/// Coarse classification of JWS algorithms by the key material they need.
///
/// A token is only offered to a key of the matching family; this blocks
/// algorithm-confusion attacks (e.g. an HMAC token "signed" with an RSA
/// public key used as the secret).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    /// `HS256`, `HS384`, `HS512` (shared secret).
    Hmac,
    /// `RS*` and `PS*` (RSA public key).
    Rsa,
    /// `ES256`, `ES384` (elliptic curve public key).
    Ecdsa,
    /// `EdDSA` (Ed25519 public key).
    EdDsa,
}

impl AlgorithmFamily {
    /// Returns the family of a JWS algorithm.
    #[must_use]
    pub fn of(alg: Algorithm) -> Self {
        match alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Self::Hmac,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Self::Rsa,
            Algorithm::ES256 | Algorithm::ES384 => Self::Ecdsa,
            Algorithm::EdDSA => Self::EdDsa,
        }
    }

    /// The algorithms belonging to this family.
    #[must_use]
    pub fn algorithms(self) -> &'static [Algorithm] {
        match self {
            Self::Hmac => &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512],
            Self::Rsa => &[
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            Self::Ecdsa => &[Algorithm::ES256, Algorithm::ES384],
            Self::EdDsa => &[Algorithm::EdDSA],
        }
    }
}

impl fmt::Display for AlgorithmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hmac => "hmac",
            Self::Rsa => "rsa",
            Self::Ecdsa => "ecdsa",
            Self::EdDsa => "eddsa",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Decode a JWT header without verifying the signature.
///
/// Used to pick the validation path (algorithm family) and the verification
/// key (`kid`) before any cryptographic work.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - An empty `kid` is normalized to `None`
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three dot-separated parts, bad base64, invalid
///   JSON, or an algorithm the JWT library does not know (including `none`)
pub fn inspect_header(token: &str) -> Result<Header, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts = token.split('.').count();
    if parts != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let mut header = jsonwebtoken::decode_header(token).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header");
        JwtValidationError::MalformedToken
    })?;

    if header.kid.as_deref().is_some_and(str::is_empty) {
        header.kid = None;
    }

    Ok(header)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which usually means a
/// pre-generated token or badly skewed issuer clock.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW by config validation
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode an Ed25519 public key from a JWK `x` field (base64url format).
///
/// Returns the raw 32 public key bytes, which is what
/// `DecodingKey::from_ed_der` expects with the ring backend.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the base64url content cannot be decoded.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================
