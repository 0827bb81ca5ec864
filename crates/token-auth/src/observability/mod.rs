//! Observability for the token-auth subsystem.
//!
//! # Privacy by Default
//!
//! Async entry points use `#[instrument(skip_all)]`; tokens, secrets and
//! subjects are never recorded as span fields, log fields or metric labels.
//! Metric labels are bounded:
//! - `strategy`: 3 values (PrivateKey, JWKs, Secret) plus `none`
//! - `outcome`: 2 values (success, failure)
//! - `error_type`: bounded by `AuthError` variants
//! - `status`: 3 values (success, error, timeout)
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `auth_token_validations_total` | Counter | `strategy`, `outcome` | Accepted/rejected tokens |
//! | `auth_token_validation_duration_seconds` | Histogram | `outcome` | End-to-end validation latency |
//! | `auth_strategy_failures_total` | Counter | `strategy`, `error_type` | Per-strategy rejections |
//! | `auth_jwks_refresh_total` | Counter | `status` | Remote key-set fetches |
//! | `auth_jwks_keys` | Gauge | none | Usable keys in the current snapshot |

pub mod metrics;

pub use metrics::{
    record_jwks_refresh, record_strategy_failure, record_token_validation, set_jwks_keys,
};
