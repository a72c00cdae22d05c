//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Safeguard errors ──────────────────────────────────────────────────────────

/// Reasons a configuration read, write, or repair did not succeed.
///
/// Every write failure leaves the live file untouched or restored.
#[derive(Debug, Error)]
pub enum SafeguardError {
    #[error("sanitized config does not survive a serialize/parse round trip")]
    RoundTrip,

    #[error("writing config failed with exit code {exit_code}; backup restored")]
    WriteFailed { exit_code: i32 },

    #[error("written config failed verification: {0}; backup restored")]
    VerifyFailed(String),

    #[error("reading config failed: {0}")]
    ReadFailed(String),

    #[error("config document is not a JSON object")]
    NotAnObject,

    #[error("neither the live config nor its backup could be parsed")]
    Unreadable,
}

// ── Settings errors ───────────────────────────────────────────────────────────

/// Invalid supervisor settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("executor args must contain the {{command}} placeholder")]
    MissingCommandPlaceholder,

    #[error("gateway.{field} must not be empty")]
    Empty { field: &'static str },
}
