//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod error;
pub mod gateway_config;
pub mod health;
pub mod restart_policy;
pub mod settings;

pub use error::{SafeguardError, SettingsError};
pub use gateway_config::{SanitizeChange, Sanitized, render_checked, sanitize};
pub use health::{ChannelStatus, GatewayStatus, Probe, StatusSource};
pub use restart_policy::{
    GatewayState, InstanceHealthState, Liveness, RestartDenied, RestartPolicy,
};
pub use settings::Settings;
