//! Common utilities shared by the token authentication crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, header inspection, iat checks)
pub mod jwt;
