//! Supervisor settings schema and validation.
//!
//! Pure types only: loading lives in `crate::infra::settings`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::SettingsError;

// ── Schema ───────────────────────────────────────────────────────────────────

/// Top-level settings stored in `config.yaml`. Every field has a default,
/// so an empty document is valid.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub supervisor: LoopSettings,
    pub policy: PolicySettings,
    pub gateway: GatewaySettings,
    pub executor: ExecutorSettings,
    pub files: FileSettings,
}

/// Timer and timeout settings for the supervisor loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    /// Seconds between sweeps.
    pub tick_interval_secs: u64,
    /// Seconds to wait after starting the gateway before re-probing it.
    pub post_start_delay_secs: u64,
    /// Timeout handed to every remote command.
    pub exec_timeout_secs: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            post_start_delay_secs: 5,
            exec_timeout_secs: 30,
        }
    }
}

impl LoopSettings {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    #[must_use]
    pub fn post_start_delay(&self) -> Duration {
        Duration::from_secs(self.post_start_delay_secs)
    }

    #[must_use]
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}

/// Upper bound for the policy windows: one year.
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

/// Restart and repair limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub max_restarts_per_hour: u32,
    pub restart_cooldown_secs: u64,
    pub hour_window_secs: u64,
    pub crash_loop_threshold: u32,
    pub repair_throttle_secs: u64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_restarts_per_hour: 3,
            restart_cooldown_secs: 5 * 60,
            hour_window_secs: 60 * 60,
            crash_loop_threshold: 3,
            repair_throttle_secs: 10 * 60,
        }
    }
}

/// Where the gateway lives inside the isolated environment and how to drive it.
///
/// Paths are interpolated into `sh -c` commands inside double quotes, so
/// `$HOME` expands remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Process name searched for in the process table.
    pub process_name: String,
    pub config_path: String,
    pub log_path: String,
    /// Foreground command that runs the gateway; the supervisor detaches it.
    pub start_command: String,
    pub health_command: String,
    pub channel_status_command: String,
    /// Credentials file written once the watched channel has been paired.
    pub pairing_file: String,
    /// Channel whose connectivity drives reconnection restarts.
    pub watched_channel: String,
    pub log_tail_lines: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            process_name: "openclaw-gateway".to_string(),
            config_path: "$HOME/.openclaw/openclaw.json".to_string(),
            log_path: "/tmp/openclaw-gateway.log".to_string(),
            start_command: "openclaw gateway run".to_string(),
            health_command: "openclaw health --json".to_string(),
            channel_status_command: "openclaw channels status --json".to_string(),
            pairing_file: "$HOME/.openclaw/credentials/whatsapp/default/creds.json".to_string(),
            watched_channel: "whatsapp".to_string(),
            log_tail_lines: 50,
        }
    }
}

impl GatewaySettings {
    /// Single backup slot next to the live config.
    #[must_use]
    pub fn backup_path(&self) -> String {
        format!("{}.bak", self.config_path)
    }
}

/// Program and argument template used to reach an isolated environment.
///
/// `{host}`, `{env}` and `{command}` are substituted per call; each argument
/// is passed as-is, never re-split by a local shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            args: ["--host", "ssh://{host}", "exec", "{env}", "sh", "-c", "{command}"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Local files used by the file-backed adapters.
///
/// Relative paths are resolved against the settings file's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub instances: PathBuf,
    pub status: PathBuf,
    pub audit_log: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            instances: PathBuf::from("instances.yaml"),
            status: PathBuf::from("status.json"),
            audit_log: PathBuf::from("audit.jsonl"),
        }
    }
}

impl FileSettings {
    /// Anchor relative paths at `base`.
    #[must_use]
    pub fn resolved_against(&self, base: &Path) -> Self {
        let anchor = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        Self {
            instances: anchor(&self.instances),
            status: anchor(&self.status),
            audit_log: anchor(&self.audit_log),
        }
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

impl Settings {
    /// Reject settings the supervisor cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let nonzero = [
            ("supervisor.tick_interval_secs", self.supervisor.tick_interval_secs),
            ("supervisor.exec_timeout_secs", self.supervisor.exec_timeout_secs),
            ("policy.hour_window_secs", self.policy.hour_window_secs),
            (
                "policy.max_restarts_per_hour",
                u64::from(self.policy.max_restarts_per_hour),
            ),
            (
                "policy.crash_loop_threshold",
                u64::from(self.policy.crash_loop_threshold),
            ),
        ];
        if let Some(&(field, _)) = nonzero.iter().find(|(_, v)| *v == 0) {
            return Err(SettingsError::Zero { field });
        }
        let windows = [
            ("policy.restart_cooldown_secs", self.policy.restart_cooldown_secs),
            ("policy.hour_window_secs", self.policy.hour_window_secs),
            ("policy.repair_throttle_secs", self.policy.repair_throttle_secs),
        ];
        if let Some(&(field, _)) = windows.iter().find(|(_, v)| *v > MAX_WINDOW_SECS) {
            return Err(SettingsError::TooLarge {
                field,
                max: MAX_WINDOW_SECS,
            });
        }
        if !self.executor.args.iter().any(|a| a.contains("{command}")) {
            return Err(SettingsError::MissingCommandPlaceholder);
        }
        let required = [
            ("process_name", &self.gateway.process_name),
            ("config_path", &self.gateway.config_path),
            ("start_command", &self.gateway.start_command),
            ("watched_channel", &self.gateway.watched_channel),
        ];
        if let Some(&(field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(SettingsError::Empty { field });
        }
        Ok(())
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
