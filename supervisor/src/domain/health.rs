//! Gateway probe parsing and channel-status resolution.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! All functions take command output in and return data out.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use supervisor_common::HealthReport;

// ── Process table ─────────────────────────────────────────────────────────────

/// Visible length of a process name in the kernel's `comm` field.
///
/// `ps -o comm` shows at most this many characters, so a long gateway name
/// such as `openclaw-gateway` is listed as `openclaw-gatewa`.
pub const COMM_VISIBLE_LEN: usize = 15;

/// Liveness of the gateway process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: Option<u16>,
}

impl GatewayStatus {
    #[must_use]
    pub fn stopped() -> Self {
        Self {
            running: false,
            pid: None,
            port: None,
        }
    }
}

/// Whether a process-table name refers to the gateway.
///
/// Accepts the exact name or a name cut at [`COMM_VISIBLE_LEN`] characters.
#[must_use]
pub fn process_name_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || (listed.len() >= COMM_VISIBLE_LEN && wanted.starts_with(listed))
}

/// Find the gateway pid in `ps -eo pid=,comm=` output.
#[must_use]
pub fn find_gateway_pid(ps_output: &str, process_name: &str) -> Option<u32> {
    ps_output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse::<u32>().ok()?;
            let comm = fields.next()?;
            Some((pid, comm))
        })
        .find(|(_, comm)| process_name_matches(comm, process_name))
        .map(|(pid, _)| pid)
}

/// Listening TCP port owned by `pid` in `ss -ltnpH` output.
#[must_use]
pub fn find_listen_port(ss_output: &str, pid: u32) -> Option<u16> {
    let needle = format!("pid={pid},");
    ss_output
        .lines()
        .filter(|line| line.contains(&needle))
        .find_map(|line| {
            let local = line.split_whitespace().nth(3)?;
            local.rsplit(':').next()?.parse().ok()
        })
}

// ── JSON payloads ─────────────────────────────────────────────────────────────

/// Parse the first JSON object in `output`, skipping any banner or log noise
/// before the first `{` and ignoring anything after the object.
#[must_use]
pub fn parse_json_payload<T: DeserializeOwned>(output: &str) -> Option<T> {
    let start = output.find('{')?;
    serde_json::Deserializer::from_str(&output[start..])
        .into_iter::<T>()
        .next()?
        .ok()
}

// ── Log scanning ──────────────────────────────────────────────────────────────

/// Lines the runtime prints when it refuses to start on a bad config.
static CONFIG_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern; cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(
        r"(?i)(invalid config|config validation failed|unrecognized key|failed to (load|parse) config|json5?\s*parse error)",
    )
    .expect("valid regex")
});

/// Whether the tail of the gateway log points at a configuration problem.
#[must_use]
pub fn log_shows_config_error(log_tail: &str) -> bool {
    CONFIG_ERROR_RE.is_match(log_tail)
}

// ── Channel status ────────────────────────────────────────────────────────────

/// Where a channel status came from, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    LiveStatus,
    HealthReport,
    PairingFile,
}

/// Sources consulted for a channel status; the first conclusive one wins.
pub const STATUS_SOURCES: [StatusSource; 3] = [
    StatusSource::LiveStatus,
    StatusSource::HealthReport,
    StatusSource::PairingFile,
];

/// Derived view of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub source: StatusSource,
    pub linked: bool,
    /// `None` when the source cannot tell (the pairing file only knows
    /// whether the channel was ever linked).
    pub connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Result of asking a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Conclusive(T),
    Inconclusive,
}

/// Read a channel out of a live-status or health payload. A channel entry
/// without a `connected` field says nothing about connectivity.
#[must_use]
pub fn channel_status_from_report(
    report: &HealthReport,
    channel: &str,
    source: StatusSource,
) -> Probe<ChannelStatus> {
    match report.channel(channel) {
        Some(ch) if ch.connected.is_some() => Probe::Conclusive(ChannelStatus {
            source,
            linked: ch.linked,
            connected: ch.connected,
            last_error: ch.last_error.clone(),
        }),
        _ => Probe::Inconclusive,
    }
}

/// Pairing-file presence as a channel status.
#[must_use]
pub fn channel_status_from_pairing(paired: bool) -> ChannelStatus {
    ChannelStatus {
        source: StatusSource::PairingFile,
        linked: paired,
        connected: None,
        last_error: None,
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
