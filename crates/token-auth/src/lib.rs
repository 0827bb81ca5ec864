//! Bearer-token authentication.
//!
//! Validates tokens against up to three kinds of key material, tried in
//! priority order until one accepts:
//!
//! 1. [`strategies::PrivateKeyStrategy`]: a local private key file
//! 2. [`strategies::RemoteKeySetStrategy`]: a remote JWKS endpoint, cached
//! 3. [`strategies::SecretStrategy`]: a shared HMAC secret
//!
//! [`service::AuthService`] composes the configured strategies. Build it
//! from [`config::AuthConfig`] and share it behind an `Arc`.

pub mod config;
pub mod errors;
pub mod jwks;
pub mod keys;
pub mod models;
pub mod observability;
pub mod service;
pub mod strategies;

pub use config::{AuthConfig, ConfigError};
pub use errors::AuthError;
pub use models::{AuthenticationResult, TokenClaims, TokenValidationResult};
pub use service::{extract_bearer_token, AuthService};
pub use strategies::AuthStrategy;
