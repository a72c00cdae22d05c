//! Sanitize rules for the gateway's JSON configuration document.
//!
//! Pure functions only: no I/O, no async. The document is handled as a
//! `serde_json::Value`; no schema is imposed beyond the rules below.

use std::fmt;

use serde_json::{Map, Value, json};

use crate::domain::error::SafeguardError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Allow-list entry that admits every sender.
pub const WILDCARD: &str = "*";

/// Per-channel access policy field.
pub const POLICY_KEY: &str = "dmPolicy";

/// Per-channel allow-list field governed by [`POLICY_KEY`].
pub const ALLOW_LIST_KEY: &str = "allowFrom";

/// Keys the runtime recognises inside a channel entry. Anything else makes
/// the runtime reject the whole document.
pub const CHANNEL_KEYS: &[&str] = &[
    "enabled",
    "name",
    "dmPolicy",
    "allowFrom",
    "groupPolicy",
    "groupAllowFrom",
    "groups",
    "accounts",
    "defaultAccount",
    "botToken",
    "tokenFile",
    "appToken",
    "signingSecret",
    "token",
    "webhookUrl",
    "webhookSecret",
    "webhookPath",
    "mediaMaxMb",
    "textChunkLimit",
    "chunkMode",
    "blockStreaming",
    "historyLimit",
    "dmHistoryLimit",
    "dms",
    "sendReadReceipts",
    "selfChatMode",
    "ackReaction",
    "debounceMs",
    "messagePrefix",
    "responsePrefix",
    "configWrites",
    "actions",
    "heartbeat",
    "capabilities",
    "proxy",
    "streamMode",
    "replyToMode",
    "linkPreview",
    "reactionNotifications",
    "guilds",
    "retry",
    "timeoutSeconds",
    "markdown",
    "authDir",
    "commands",
];

/// Keys valid on individual agent entries but rejected in `agents.defaults`.
pub const DEFAULTS_DENYLIST: &[&str] = &["id", "default", "name", "identity", "agentDir"];

// ── Types ────────────────────────────────────────────────────────────────────

/// Access policy of a channel (or channel account).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    Open,
    Allowlist,
    Disabled,
    /// Any other value, e.g. `"pairing"`. Left alone.
    Other,
}

impl AccessPolicy {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "open" => Self::Open,
            "allowlist" => Self::Allowlist,
            "disabled" => Self::Disabled,
            _ => Self::Other,
        }
    }
}

/// One modification made by [`sanitize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeChange {
    RemovedKey { path: String },
    WildcardAdded { path: String },
    WildcardRemoved { path: String },
    AllowListCleared { path: String },
}

impl fmt::Display for SanitizeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemovedKey { path } => write!(f, "removed unrecognized key {path}"),
            Self::WildcardAdded { path } => {
                write!(f, "{path}.{ALLOW_LIST_KEY} set to [\"{WILDCARD}\"] for open policy")
            }
            Self::WildcardRemoved { path } => {
                write!(f, "removed \"{WILDCARD}\" from {path}.{ALLOW_LIST_KEY} (allowlist policy)")
            }
            Self::AllowListCleared { path } => {
                write!(f, "cleared {path}.{ALLOW_LIST_KEY} (disabled policy)")
            }
        }
    }
}

/// Sanitized document plus what changed.
#[derive(Debug, Clone)]
pub struct Sanitized {
    pub document: Value,
    pub changes: Vec<SanitizeChange>,
}

impl Sanitized {
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }
}

// ── Sanitize ─────────────────────────────────────────────────────────────────

/// Remove unrecognized channel keys, make every channel's policy agree with
/// its allow-list, and strip per-entry-only keys from `agents.defaults`.
///
/// Idempotent: sanitizing a sanitized document reports no changes.
#[must_use]
pub fn sanitize(doc: &Value) -> Sanitized {
    let mut document = doc.clone();
    let mut changes = Vec::new();

    if let Some(channels) = document.get_mut("channels").and_then(Value::as_object_mut) {
        for (name, entry) in channels.iter_mut() {
            let Some(entry) = entry.as_object_mut() else {
                continue;
            };
            let path = format!("channels.{name}");
            strip_unknown_channel_keys(entry, &path, &mut changes);
            enforce_policy(entry, &path, &mut changes);
            if let Some(accounts) = entry.get_mut("accounts").and_then(Value::as_object_mut) {
                for (account, settings) in accounts.iter_mut() {
                    if let Some(settings) = settings.as_object_mut() {
                        let account_path = format!("{path}.accounts.{account}");
                        enforce_policy(settings, &account_path, &mut changes);
                    }
                }
            }
        }
    }

    if let Some(defaults) = document
        .pointer_mut("/agents/defaults")
        .and_then(Value::as_object_mut)
    {
        for key in DEFAULTS_DENYLIST {
            if defaults.remove(*key).is_some() {
                changes.push(SanitizeChange::RemovedKey {
                    path: format!("agents.defaults.{key}"),
                });
            }
        }
    }

    Sanitized { document, changes }
}

fn strip_unknown_channel_keys(
    entry: &mut Map<String, Value>,
    path: &str,
    changes: &mut Vec<SanitizeChange>,
) {
    let unknown: Vec<String> = entry
        .keys()
        .filter(|k| !CHANNEL_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();
    for key in unknown {
        entry.remove(&key);
        changes.push(SanitizeChange::RemovedKey {
            path: format!("{path}.{key}"),
        });
    }
}

fn enforce_policy(entry: &mut Map<String, Value>, path: &str, changes: &mut Vec<SanitizeChange>) {
    let policy = match entry.get(POLICY_KEY).and_then(Value::as_str) {
        Some(p) => AccessPolicy::parse(p),
        None => return,
    };
    let path = path.to_string();
    match policy {
        AccessPolicy::Open => {
            let has_wildcard = entry
                .get(ALLOW_LIST_KEY)
                .and_then(Value::as_array)
                .is_some_and(|list| list.iter().any(is_wildcard));
            if !has_wildcard {
                entry.insert(ALLOW_LIST_KEY.to_string(), json!([WILDCARD]));
                changes.push(SanitizeChange::WildcardAdded { path });
            }
        }
        AccessPolicy::Allowlist => {
            if let Some(list) = entry.get_mut(ALLOW_LIST_KEY).and_then(Value::as_array_mut) {
                let before = list.len();
                list.retain(|v| !is_wildcard(v));
                if list.len() != before {
                    changes.push(SanitizeChange::WildcardRemoved { path });
                }
            }
        }
        AccessPolicy::Disabled => {
            let empty = entry
                .get(ALLOW_LIST_KEY)
                .and_then(Value::as_array)
                .is_some_and(Vec::is_empty);
            if !empty {
                entry.insert(ALLOW_LIST_KEY.to_string(), json!([]));
                changes.push(SanitizeChange::AllowListCleared { path });
            }
        }
        AccessPolicy::Other => {}
    }
}

fn is_wildcard(value: &Value) -> bool {
    value.as_str() == Some(WILDCARD)
}

// ── Round trip ───────────────────────────────────────────────────────────────

/// Serialize `doc` and prove the text parses back to the same document.
///
/// # Errors
///
/// Returns `SafeguardError::NotAnObject` for a non-object document and
/// `SafeguardError::RoundTrip` if the text does not parse back losslessly.
pub fn render_checked(doc: &Value) -> Result<String, SafeguardError> {
    if !doc.is_object() {
        return Err(SafeguardError::NotAnObject);
    }
    let text = serde_json::to_string_pretty(doc).map_err(|_| SafeguardError::RoundTrip)?;
    let parsed: Value = serde_json::from_str(&text).map_err(|_| SafeguardError::RoundTrip)?;
    if &parsed != doc {
        return Err(SafeguardError::RoundTrip);
    }
    Ok(text)
}

// ── Unit tests ───────────────────────────────────────────────────────────────
