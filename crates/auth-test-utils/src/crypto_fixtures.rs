//! Fixed cryptographic fixtures for testing
//!
//! The RSA and P-256 keys live under `fixtures/` and were generated once with
//! openssl; the same RSA key is stored in all four on-disk encodings so that
//! format detection can be tested against a known key. Ed25519 keys are
//! derived deterministically from a seed.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use ring::signature::{Ed25519KeyPair, KeyPair};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use std::io::Write;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Primary RSA-2048 key, PKCS#1 PEM (`BEGIN RSA PRIVATE KEY`).
pub const RSA_PKCS1_PEM: &[u8] = include_bytes!("../fixtures/rsa_pkcs1.pem");

/// Primary RSA-2048 key, PKCS#8 PEM (`BEGIN PRIVATE KEY`).
pub const RSA_PKCS8_PEM: &[u8] = include_bytes!("../fixtures/rsa_pkcs8.pem");

/// Primary RSA-2048 key, PKCS#1 DER.
pub const RSA_PKCS1_DER: &[u8] = include_bytes!("../fixtures/rsa_pkcs1.der");

/// Primary RSA-2048 key, PKCS#8 DER.
pub const RSA_PKCS8_DER: &[u8] = include_bytes!("../fixtures/rsa_pkcs8.der");

/// An unrelated RSA-2048 key, PKCS#8 PEM. Tokens signed with it must never
/// verify against the primary key.
pub const OTHER_RSA_PKCS8_PEM: &[u8] = include_bytes!("../fixtures/other_rsa_pkcs8.pem");

/// P-256 key, SEC1 PEM (`BEGIN EC PRIVATE KEY`).
pub const EC_SEC1_PEM: &[u8] = include_bytes!("../fixtures/ec_sec1.pem");

/// The same P-256 key, PKCS#8 PEM (what `EncodingKey::from_ec_pem` accepts).
pub const EC_PKCS8_PEM: &[u8] = include_bytes!("../fixtures/ec_pkcs8.pem");

/// Write key bytes to a fresh temporary file.
///
/// The file is deleted when the returned handle is dropped, so keep it alive
/// for as long as the path is in use.
///
/// # Errors
///
/// Returns `FixtureError::Io` if the temp file cannot be created or written.
pub fn write_key_file(bytes: &[u8]) -> Result<NamedTempFile, FixtureError> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Build the public RSA JWK (`kty=RSA`, `n`, `e`) for a PKCS#8 PEM private key.
///
/// # Panics
///
/// Panics if `pkcs8_pem` is not a valid PKCS#8 PEM RSA key.
pub fn rsa_public_jwk(pkcs8_pem: &[u8], kid: &str) -> serde_json::Value {
    let pem = std::str::from_utf8(pkcs8_pem).expect("fixture PEM is UTF-8");
    let key = RsaPrivateKey::from_pkcs8_pem(pem).expect("fixture is a PKCS#8 RSA key");

    serde_json::json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
        "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
    })
}

/// Build the public EC JWK (`kty=EC`, `crv=P-256`) for a SEC1 PEM private key.
///
/// # Panics
///
/// Panics if `sec1_pem` is not a valid SEC1 PEM P-256 key.
pub fn ec_public_jwk(sec1_pem: &[u8], kid: &str) -> serde_json::Value {
    let pem = std::str::from_utf8(sec1_pem).expect("fixture PEM is UTF-8");
    let secret = p256::SecretKey::from_sec1_pem(pem).expect("fixture is a SEC1 P-256 key");
    let point = secret.public_key().to_encoded_point(false);
    let x = point.x().expect("uncompressed point has x");
    let y = point.y().expect("uncompressed point has y");

    serde_json::json!({
        "kty": "EC",
        "kid": kid,
        "use": "sig",
        "alg": "ES256",
        "crv": "P-256",
        "x": URL_SAFE_NO_PAD.encode(x),
        "y": URL_SAFE_NO_PAD.encode(y),
    })
}

/// Wrap JWKs into a JWKS document (`{"keys": [...]}`).
pub fn jwks_document(keys: &[serde_json::Value]) -> serde_json::Value {
    serde_json::json!({ "keys": keys })
}

/// Deterministic Ed25519 keypair for remote key-set tests.
pub struct Ed25519TestKey {
    pub kid: String,
    pub public_key_bytes: Vec<u8>,
    pub private_key_pkcs8: Vec<u8>,
}

impl Ed25519TestKey {
    /// Derive a keypair from a one-byte seed. Same seed, same key.
    ///
    /// # Errors
    ///
    /// Returns `FixtureError::Crypto` if ring rejects the derived seed.
    pub fn new(seed: u8, kid: &str) -> Result<Self, FixtureError> {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .map_err(|e| FixtureError::Crypto(format!("Failed to derive keypair: {e:?}")))?;

        Ok(Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_ed25519_pkcs8(&seed_bytes),
        })
    }

    /// The public OKP JWK for this key.
    pub fn jwk(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig",
        })
    }
}

/// PKCS#8 v1 wrapping of an Ed25519 seed (RFC 8410).
fn build_ed25519_pkcs8(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = vec![
        0x30, 0x2e, // SEQUENCE, 46 bytes
        0x02, 0x01, 0x00, // INTEGER 0 (version)
        0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, // AlgorithmIdentifier, OID 1.3.101.112
        0x04, 0x22, 0x04, 0x20, // OCTET STRING { OCTET STRING (32) }
    ];
    pkcs8.extend_from_slice(seed);
    pkcs8
}
