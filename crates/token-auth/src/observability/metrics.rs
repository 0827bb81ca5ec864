//! Metric definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! The crate only talks to the `metrics` facade. Installing an exporter is
//! the embedding service's job; without one every call here is a no-op.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record the outcome of one `AuthService::validate_token` call.
///
/// Metric: `auth_token_validations_total`, `auth_token_validation_duration_seconds`
/// Labels: `strategy` (winning strategy, or `none`), `outcome`
pub fn record_token_validation(strategy: Option<&str>, valid: bool, duration: Duration) {
    let outcome = outcome_label(valid);

    histogram!("auth_token_validation_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());

    counter!("auth_token_validations_total",
        "strategy" => strategy.unwrap_or("none").to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a single strategy rejecting a token.
///
/// Metric: `auth_strategy_failures_total`
/// Labels: `strategy`, `error_type` (from `AuthError::error_type`)
pub fn record_strategy_failure(strategy: &str, error_type: &'static str) {
    counter!("auth_strategy_failures_total",
        "strategy" => strategy.to_string(),
        "error_type" => error_type
    )
    .increment(1);
}

fn outcome_label(valid: bool) -> &'static str {
    if valid {
        "success"
    } else {
        "failure"
    }
}

// ============================================================================
// Remote Key-Set Metrics
// ============================================================================

/// Record a remote key-set fetch attempt.
///
/// Metric: `auth_jwks_refresh_total`
/// Labels: `status` (success, error, timeout)
pub fn record_jwks_refresh(status: &'static str) {
    counter!("auth_jwks_refresh_total", "status" => status).increment(1);
}

/// Set the number of usable keys in the current snapshot.
///
/// Metric: `auth_jwks_keys`
#[allow(clippy::cast_precision_loss)]
pub fn set_jwks_keys(count: usize) {
    gauge!("auth_jwks_keys").set(count as f64);
}
