use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One managed deployment of the agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    /// Stable instance identifier.
    pub id: String,
    /// Host the isolated environment lives on.
    pub host: String,
    /// Isolated environment (container) name on that host.
    pub environment: String,
    /// Inactive instances are listed but never supervised.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Gateway status as persisted for an instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Running,
    Stopped,
}

/// Last persisted status of an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusEntry {
    pub status: InstanceStatus,
    pub updated_at: DateTime<Utc>,
}

/// What the supervisor did that produced an audit record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    GatewayRestart,
    ConfigRepair,
}

/// Short reason code carried by every audit record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditReason {
    /// Gateway process not found in the process table.
    ProcessDown,
    /// Consecutive crash counter reached the crash-loop threshold.
    CrashLoop,
    /// Gateway died right after a start and its log shows a config error.
    ConfigErrorInLog,
    /// Watched channel went from connected to disconnected.
    ChannelDisconnected,
    /// Operator requested the action from the CLI.
    Manual,
}

impl AuditReason {
    /// Reason code as written to the audit log.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ProcessDown => "process_down",
            Self::CrashLoop => "crash_loop",
            Self::ConfigErrorInLog => "config_error_in_log",
            Self::ChannelDisconnected => "channel_disconnected",
            Self::Manual => "manual",
        }
    }
}

/// One audit record per restart attempt and per configuration repair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRecord {
    pub instance_id: String,
    pub action: AuditAction,
    pub success: bool,
    pub reason: AuditReason,
    pub at: DateTime<Utc>,
}
