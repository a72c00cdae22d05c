//! Plain-text wording for supervisor results.

use crate::application::services::supervisor::Attempt;
use crate::domain::health::{ChannelStatus, GatewayStatus, StatusSource};
use crate::domain::restart_policy::{GatewayState, RestartDenied};

#[must_use]
pub fn state_text(state: GatewayState) -> &'static str {
    match state {
        GatewayState::RunningHealthy => "running (healthy)",
        GatewayState::RunningUnhealthy => "running (unhealthy)",
        GatewayState::Down => "down",
        GatewayState::CrashLooping => "crash looping",
        GatewayState::Unknown => "unknown (probe failed; skipped)",
    }
}

#[must_use]
pub fn denied_text(denied: RestartDenied) -> &'static str {
    match denied {
        RestartDenied::Cooldown => "cooldown",
        RestartDenied::HourlyCap => "hourly cap reached",
    }
}

/// "reason: ok" or "reason: failed".
#[must_use]
pub fn attempt_text(attempt: Attempt) -> String {
    let outcome = if attempt.succeeded { "ok" } else { "failed" };
    format!("{}: {outcome}", attempt.reason.code())
}

/// "gateway running (pid 4242, port 18789)", with `?` for what the socket
/// table did not tell.
#[must_use]
pub fn running_text(status: &GatewayStatus) -> String {
    let pid = status.pid.map_or_else(|| "?".to_string(), |p| p.to_string());
    let port = status.port.map_or_else(|| "?".to_string(), |p| p.to_string());
    format!("gateway running (pid {pid}, port {port})")
}

/// e.g. "linked, connected (live status)".
#[must_use]
pub fn channel_text(status: &ChannelStatus) -> String {
    let linked = if status.linked { "linked" } else { "not linked" };
    let connected = match status.connected {
        Some(true) => "connected",
        Some(false) => "disconnected",
        None => "connectivity unknown",
    };
    let source = match status.source {
        StatusSource::LiveStatus => "live status",
        StatusSource::HealthReport => "health report",
        StatusSource::PairingFile => "pairing file",
    };
    let mut line = format!("{linked}, {connected} ({source})");
    if let Some(err) = &status.last_error {
        line.push_str(&format!(": {err}"));
    }
    line
}
