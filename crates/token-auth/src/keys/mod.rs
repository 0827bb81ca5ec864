//! Private key material for the private-key strategy.
//!
//! `loader` reads a key file once and detects its encoding by trial decoding;
//! `format` holds the per-encoding decoders. The verification key handed to
//! `jsonwebtoken` is always derived from the public half of the loaded key.

mod format;
mod loader;

pub use format::{KeyFormat, DEFAULT_FORMAT_ORDER};
pub use loader::{KeyFormatLoader, LoadedPrivateKey, PrivateKeyFile};

use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use common::jwt::AlgorithmFamily;
use jsonwebtoken::{Algorithm, DecodingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use std::fmt;

/// A decoded asymmetric private key.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(RsaPrivateKey),
    /// P-256 only.
    Ecdsa(p256::SecretKey),
}

impl PrivateKey {
    /// Algorithm family of tokens this key can verify.
    pub fn family(&self) -> AlgorithmFamily {
        match self {
            PrivateKey::Rsa(_) => AlgorithmFamily::Rsa,
            PrivateKey::Ecdsa(_) => AlgorithmFamily::Ecdsa,
        }
    }

    /// Algorithms accepted for this key. ES384 needs a P-384 key, so a P-256
    /// key accepts ES256 only.
    pub fn algorithms(&self) -> &'static [Algorithm] {
        match self {
            PrivateKey::Rsa(_) => AlgorithmFamily::Rsa.algorithms(),
            PrivateKey::Ecdsa(_) => &[Algorithm::ES256],
        }
    }

    /// Build the verification key from the public half.
    pub fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self {
            PrivateKey::Rsa(key) => Ok(DecodingKey::from_rsa_raw_components(
                &key.n().to_bytes_be(),
                &key.e().to_bytes_be(),
            )),
            PrivateKey::Ecdsa(key) => {
                let point = key.public_key().to_encoded_point(false);
                let (Some(x), Some(y)) = (point.x(), point.y()) else {
                    return Err(AuthError::PrivateKeyParseError(
                        "EC public point has no affine coordinates".to_string(),
                    ));
                };
                DecodingKey::from_ec_components(&URL_SAFE_NO_PAD.encode(x), &URL_SAFE_NO_PAD.encode(y))
                    .map_err(|e| AuthError::PrivateKeyParseError(e.to_string()))
            }
        }
    }
}

/// Key material is never printed.
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKey::Rsa(key) => f
                .debug_struct("PrivateKey::Rsa")
                .field("bits", &(key.size() * 8))
                .finish_non_exhaustive(),
            PrivateKey::Ecdsa(_) => f
                .debug_struct("PrivateKey::Ecdsa")
                .field("curve", &"P-256")
                .finish_non_exhaustive(),
        }
    }
}
