//! On-disk private key encodings and how to decode each one.

use crate::keys::PrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use std::fmt;

/// Private key encodings the loader knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFormat {
    /// PKCS#1 `RSAPrivateKey`, PEM armored (`BEGIN RSA PRIVATE KEY`).
    RsaPem,
    /// PKCS#8 `PrivateKeyInfo` holding an RSA key, PEM armored (`BEGIN PRIVATE KEY`).
    Pkcs8Pem,
    /// PKCS#1 `RSAPrivateKey`, raw DER.
    RsaDer,
    /// PKCS#8 `PrivateKeyInfo` holding an RSA key, raw DER.
    Pkcs8Der,
    /// SEC1 `ECPrivateKey` on P-256, PEM armored (`BEGIN EC PRIVATE KEY`).
    EcdsaPem,
    /// No format detected.
    Unknown,
}

/// Trial order used when no explicit format list is given.
///
/// `EcdsaPem` is deliberately absent: ECDSA key files must be opted into.
pub const DEFAULT_FORMAT_ORDER: [KeyFormat; 4] = [
    KeyFormat::RsaPem,
    KeyFormat::Pkcs8Pem,
    KeyFormat::RsaDer,
    KeyFormat::Pkcs8Der,
];

impl KeyFormat {
    /// Stable identifier used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            KeyFormat::RsaPem => "RSA_PEM",
            KeyFormat::Pkcs8Pem => "PKCS8_PEM",
            KeyFormat::RsaDer => "RSA_DER",
            KeyFormat::Pkcs8Der => "PKCS8_DER",
            KeyFormat::EcdsaPem => "ECDSA_PEM",
            KeyFormat::Unknown => "UNKNOWN",
        }
    }

    /// Decode `bytes` under this interpretation.
    ///
    /// Returns a short reason on failure; the loader logs it and moves on to
    /// the next format.
    pub fn decode(self, bytes: &[u8]) -> Result<PrivateKey, String> {
        match self {
            KeyFormat::RsaPem => RsaPrivateKey::from_pkcs1_pem(as_pem(bytes)?)
                .map(PrivateKey::Rsa)
                .map_err(|e| e.to_string()),
            KeyFormat::Pkcs8Pem => RsaPrivateKey::from_pkcs8_pem(as_pem(bytes)?)
                .map(PrivateKey::Rsa)
                .map_err(|e| e.to_string()),
            KeyFormat::RsaDer => RsaPrivateKey::from_pkcs1_der(bytes)
                .map(PrivateKey::Rsa)
                .map_err(|e| e.to_string()),
            KeyFormat::Pkcs8Der => RsaPrivateKey::from_pkcs8_der(bytes)
                .map(PrivateKey::Rsa)
                .map_err(|e| e.to_string()),
            KeyFormat::EcdsaPem => p256::SecretKey::from_sec1_pem(as_pem(bytes)?)
                .map(PrivateKey::Ecdsa)
                .map_err(|e| e.to_string()),
            KeyFormat::Unknown => Err("no decoder for unknown format".to_string()),
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn as_pem(bytes: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|_| "not valid UTF-8 PEM text".to_string())
}
