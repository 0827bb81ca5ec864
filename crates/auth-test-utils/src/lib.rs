//! # Auth Test Utilities
//!
//! Shared test utilities for the token authentication crates.
//!
//! This crate provides:
//! - Fixed key material in every supported on-disk format (PEM/DER fixtures)
//! - Temporary key files for loader tests
//! - JWK / JWKS document builders matching the fixture keys
//! - Test token builders (`TestTokenBuilder`) with HMAC, RSA, ECDSA and
//!   Ed25519 signing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! let token = TestTokenBuilder::new()
//!     .for_subject("user-1")
//!     .sign_hs256("s3cret");
//!
//! let key_file = write_key_file(RSA_PKCS8_PEM)?;
//! let jwks = jwks_document(&[rsa_public_jwk(RSA_PKCS8_PEM, "key-01")]);
//! ```

pub mod crypto_fixtures;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use token_builders::*;
