//! Remote key set (JWKS) support.
//!
//! - [`Jwk`] / [`JwkSet`]: wire types for the published key document
//! - [`SigningKey`]: a JWK resolved into a verification key
//! - [`KeySetSnapshot`]: the immutable set of resolved keys served to readers
//! - [`RemoteKeySetCache`]: fetch, cache and refresh policy
//!
//! Only public asymmetric signing keys are accepted: `RSA`, `EC` on P-256 and
//! `OKP` Ed25519. Symmetric (`oct`) keys and malformed entries are dropped
//! when a snapshot is built.

mod cache;
mod fetcher;

pub use cache::{KeySetCacheConfig, RemoteKeySetCache, RemoteKeySetEndpoint};
pub use fetcher::{HttpKeySetFetcher, KeySetFetcher};

use common::jwt::{decode_ed25519_public_key_jwk, AlgorithmFamily};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

/// JSON Web Key as published by the key-set endpoint.
///
/// Every field is optional so one odd entry cannot fail the whole document;
/// entries that cannot be used are skipped when the snapshot is built.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jwk {
    /// Key type: `RSA`, `EC`, `OKP` (or `oct`, which is rejected).
    #[serde(default)]
    pub kty: String,

    #[serde(default)]
    pub kid: Option<String>,

    /// Intended algorithm. When present, only this algorithm is accepted.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use; anything other than `sig` is skipped.
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    #[serde(default)]
    pub crv: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// EC / OKP x coordinate (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document (`{"keys": [...]}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// A JWK resolved into something `jsonwebtoken` can verify with.
#[derive(Clone)]
pub struct SigningKey {
    kid: Option<String>,
    family: AlgorithmFamily,
    algorithms: Vec<Algorithm>,
    key: DecodingKey,
}

impl SigningKey {
    /// Resolve a JWK. Returns a short reason when the key is unusable.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        if let Some(key_use) = jwk.key_use.as_deref() {
            if key_use != "sig" {
                return Err(format!("key use '{key_use}' is not 'sig'"));
            }
        }

        let (family, key) = match jwk.kty.as_str() {
            "RSA" => {
                let n = required(jwk.n.as_deref(), "n")?;
                let e = required(jwk.e.as_deref(), "e")?;
                let key = DecodingKey::from_rsa_components(n, e).map_err(|e| e.to_string())?;
                (AlgorithmFamily::Rsa, key)
            }
            "EC" => {
                match jwk.crv.as_deref() {
                    Some("P-256") => {}
                    other => return Err(format!("unsupported EC curve {other:?}")),
                }
                let x = required(jwk.x.as_deref(), "x")?;
                let y = required(jwk.y.as_deref(), "y")?;
                let key = DecodingKey::from_ec_components(x, y).map_err(|e| e.to_string())?;
                (AlgorithmFamily::Ecdsa, key)
            }
            "OKP" => {
                match jwk.crv.as_deref() {
                    Some("Ed25519") => {}
                    other => return Err(format!("unsupported OKP curve {other:?}")),
                }
                let x = required(jwk.x.as_deref(), "x")?;
                let raw = decode_ed25519_public_key_jwk(x).map_err(|e| e.to_string())?;
                if raw.len() != 32 {
                    return Err(format!("Ed25519 public key is {} bytes, expected 32", raw.len()));
                }
                (AlgorithmFamily::EdDsa, DecodingKey::from_ed_der(&raw))
            }
            "oct" => return Err("symmetric keys are not accepted from a key set".to_string()),
            other => return Err(format!("unsupported key type '{other}'")),
        };

        let algorithms = match jwk.alg.as_deref() {
            Some(alg) => {
                let alg = Algorithm::from_str(alg).map_err(|_| format!("unknown alg '{alg}'"))?;
                if AlgorithmFamily::of(alg) != family {
                    return Err(format!("alg {alg:?} does not match key type {}", jwk.kty));
                }
                vec![alg]
            }
            // EC keys are P-256 only
            None if family == AlgorithmFamily::Ecdsa => vec![Algorithm::ES256],
            None => family.algorithms().to_vec(),
        };

        Ok(Self {
            kid: jwk.kid.clone().filter(|kid| !kid.is_empty()),
            family,
            algorithms,
            key,
        })
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn family(&self) -> AlgorithmFamily {
        self.family
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Whether a token with header algorithm `alg` may be checked against this key.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing '{field}'"))
}

/// An immutable, fully resolved key set.
///
/// Replaced wholesale on every successful refresh; readers holding an `Arc`
/// to an older snapshot keep using it undisturbed.
#[derive(Debug)]
pub struct KeySetSnapshot {
    keyed: HashMap<String, SigningKey>,
    unkeyed: Vec<SigningKey>,
    fetched_at: Instant,
    generation: u64,
}

impl KeySetSnapshot {
    /// Resolve every usable key in `set`, logging the ones that are skipped.
    pub fn from_jwk_set(set: &JwkSet, generation: u64) -> Self {
        let mut keyed = HashMap::new();
        let mut unkeyed = Vec::new();

        for jwk in &set.keys {
            let key = match SigningKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(reason) => {
                    tracing::warn!(
                        target: "auth.jwks",
                        kid = ?jwk.kid,
                        kty = %jwk.kty,
                        reason = %reason,
                        "Skipping unusable key in key set"
                    );
                    continue;
                }
            };

            match key.kid.clone() {
                Some(kid) => {
                    if keyed.contains_key(&kid) {
                        tracing::warn!(target: "auth.jwks", kid = %kid, "Duplicate kid in key set, keeping first");
                    } else {
                        keyed.insert(kid, key);
                    }
                }
                None => unkeyed.push(key),
            }
        }

        Self {
            keyed,
            unkeyed,
            fetched_at: Instant::now(),
            generation,
        }
    }

    /// The key published under `kid`.
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keyed.get(kid)
    }

    /// Every key (with or without kid) that accepts `alg`.
    pub fn candidates(&self, alg: Algorithm) -> impl Iterator<Item = &SigningKey> {
        self.keyed
            .values()
            .chain(self.unkeyed.iter())
            .filter(move |key| key.accepts(alg))
    }

    /// Number of usable keys.
    pub fn len(&self) -> usize {
        self.keyed.len() + self.unkeyed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key IDs in this snapshot, sorted.
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keyed.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Monotonically increasing per cache; the first snapshot is generation 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
