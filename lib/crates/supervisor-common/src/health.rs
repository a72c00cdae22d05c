//! Wire shape of the gateway's health query.
//!
//! Every field is optional on the wire. Missing booleans read as `false`,
//! except `connected`, which stays `None` so callers can tell "not reported"
//! from "disconnected".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Payload returned by the runtime's health query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelHealth>,
}

impl HealthReport {
    /// Health of a single channel, if the runtime reported it.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<&ChannelHealth> {
        self.channels.get(name)
    }
}

/// Per-channel connectivity as reported by the runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)] // mirrors the runtime's payload
pub struct ChannelHealth {
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub linked: bool,
    #[serde(default)]
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_id: Option<ChannelSelf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Epoch milliseconds of the last successful connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<i64>,
    /// Free-form disconnect details; the runtime changes this shape between releases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<serde_json::Value>,
}

/// Identity the channel is logged in as.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelSelf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e164: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jid: Option<String>,
}
