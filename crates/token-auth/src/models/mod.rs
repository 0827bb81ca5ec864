//! Validation results and token claims.

use crate::errors::AuthError;
use crate::strategies::AuthStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Outcome of a single strategy validating a token.
///
/// Immutable once produced. `subject` is empty when the token carried no
/// `sub` claim or validation failed.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenValidationResult {
    is_valid: bool,
    subject: String,
    failure: Option<AuthError>,
}

impl TokenValidationResult {
    /// A successful validation for `subject` (may be empty).
    pub fn valid(subject: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            subject: subject.into(),
            failure: None,
        }
    }

    /// A rejected validation.
    pub fn invalid(failure: AuthError) -> Self {
        Self {
            is_valid: false,
            subject: String::new(),
            failure: Some(failure),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn failure(&self) -> Option<&AuthError> {
        self.failure.as_ref()
    }
}

/// Subject is redacted: it identifies a user and must not end up in logs.
impl fmt::Debug for TokenValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = if self.subject.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        f.debug_struct("TokenValidationResult")
            .field("is_valid", &self.is_valid)
            .field("subject", &subject)
            .field("failure", &self.failure)
            .finish()
    }
}

/// Outcome of the authentication service arbitrating across strategies.
///
/// `strategy` is the strategy that accepted the token, or `None` when every
/// strategy rejected it (or none was invoked).
#[derive(Clone)]
pub struct AuthenticationResult {
    strategy: Option<Arc<dyn AuthStrategy>>,
    result: TokenValidationResult,
}

impl AuthenticationResult {
    pub(crate) fn accepted(strategy: Arc<dyn AuthStrategy>, result: TokenValidationResult) -> Self {
        Self {
            strategy: Some(strategy),
            result,
        }
    }

    pub(crate) fn rejected(failure: AuthError) -> Self {
        Self {
            strategy: None,
            result: TokenValidationResult::invalid(failure),
        }
    }

    /// The winning strategy, if any.
    pub fn strategy(&self) -> Option<&Arc<dyn AuthStrategy>> {
        self.strategy.as_ref()
    }

    /// Name of the winning strategy, if any.
    pub fn strategy_name(&self) -> Option<&str> {
        self.strategy.as_deref().map(|s| s.name())
    }

    pub fn result(&self) -> &TokenValidationResult {
        &self.result
    }

    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }

    pub fn subject(&self) -> &str {
        self.result.subject()
    }

    pub fn failure(&self) -> Option<&AuthError> {
        self.result.failure()
    }
}

impl fmt::Debug for AuthenticationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationResult")
            .field("strategy", &self.strategy_name())
            .field("result", &self.result)
            .finish()
    }
}

/// Claims read from a verified token.
///
/// Every field is optional: a token without `sub` is still valid, and `exp`
/// is only enforced when present. The `sub` field is redacted in Debug output.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub iat: Option<i64>,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}
