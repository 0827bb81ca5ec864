//! Secret types for protecting credential material from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for the HMAC shared secret and any
//! other credential that flows through configuration.
//!
//! `SecretString` implements `Debug` with redaction, so a config struct that
//! derives `Debug` never prints the secret via `{:?}` or tracing fields.
//! Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SecretSource {
//!     issuer: String,
//!     hmac_secret: SecretString,
//! }
//!
//! let source = SecretSource {
//!     issuer: "tasks-api".to_string(),
//!     hmac_secret: SecretString::from("s3cret"),
//! };
//!
//! // hmac_secret is redacted
//! println!("{source:?}");
//!
//! // Key material is only reachable through an explicit call
//! let key: &[u8] = source.hmac_secret.expose_secret().as_bytes();
//! # assert_eq!(key, b"s3cret");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
