//! Builder patterns for test token construction
//!
//! Provides a fluent API for claims plus signing helpers for every algorithm
//! family the strategies accept.

use crate::crypto_fixtures::Ed25519TestKey;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for creating signed test JWTs
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_subject("alice")
///     .expires_in(3600)
///     .with_kid("key-01")
///     .sign_rs256(RSA_PKCS8_PEM);
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
    nbf: Option<i64>,
    kid: Option<String>,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults: subject `test-subject`,
    /// issued now, expiring in one hour.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: Some("test-subject".to_string()),
            exp: Some((now + Duration::seconds(3600)).timestamp()),
            iat: Some(now.timestamp()),
            nbf: None,
            kid: None,
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Omit the `sub` claim entirely
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Omit the `exp` claim entirely
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Set the `kid` header
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Add an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build_claims(&self) -> Value {
        let mut claims = self.extra.clone();
        if let Some(sub) = &self.sub {
            claims.insert("sub".to_string(), json!(sub));
        }
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(iat) = self.iat {
            claims.insert("iat".to_string(), json!(iat));
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        Value::Object(claims)
    }

    /// Sign with an HMAC shared secret (HS256)
    pub fn sign_hs256(self, secret: &str) -> String {
        self.sign_hmac(Algorithm::HS256, secret)
    }

    /// Sign with an HMAC shared secret and a specific HS* algorithm
    pub fn sign_hmac(self, alg: Algorithm, secret: &str) -> String {
        self.sign(alg, &EncodingKey::from_secret(secret.as_bytes()))
    }

    /// Sign with an RSA private key in PKCS#1 or PKCS#8 PEM (RS256)
    pub fn sign_rs256(self, pem: &[u8]) -> String {
        self.sign_rsa(Algorithm::RS256, pem)
    }

    /// Sign with an RSA private key and a specific RS*/PS* algorithm
    pub fn sign_rsa(self, alg: Algorithm, pem: &[u8]) -> String {
        let key = EncodingKey::from_rsa_pem(pem).expect("fixture is a valid RSA PEM");
        self.sign(alg, &key)
    }

    /// Sign with a P-256 private key in PKCS#8 PEM (ES256)
    pub fn sign_es256(self, pkcs8_pem: &[u8]) -> String {
        let key = EncodingKey::from_ec_pem(pkcs8_pem).expect("fixture is a valid EC PEM");
        self.sign(Algorithm::ES256, &key)
    }

    /// Sign with a deterministic Ed25519 key (EdDSA), using its kid
    pub fn sign_eddsa(mut self, key: &Ed25519TestKey) -> String {
        if self.kid.is_none() {
            self.kid = Some(key.kid.clone());
        }
        self.sign(
            Algorithm::EdDSA,
            &EncodingKey::from_ed_der(&key.private_key_pkcs8),
        )
    }

    fn sign(self, alg: Algorithm, key: &EncodingKey) -> String {
        let mut header = Header::new(alg);
        header.typ = Some("JWT".to_string());
        header.kid = self.kid.clone();

        encode(&header, &self.build_claims(), key).expect("Failed to sign test token")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
