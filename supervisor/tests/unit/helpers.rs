//! Shared test helpers: a simulated isolated environment plus recording
//! registry, audit sink, and clock.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use gateway_supervisor::application::ports::{
    AuditSink, Clock, ExecOutput, InstanceRegistry, RemoteExecutor,
};
use gateway_supervisor::domain::gateway_config::sanitize;
use gateway_supervisor::domain::settings::Settings;
use supervisor_common::{AuditAction, AuditRecord, Instance, InstanceStatus};

pub const CONFIG_PATH: &str = "/home/node/.openclaw/openclaw.json";
pub const BACKUP_PATH: &str = "/home/node/.openclaw/openclaw.json.bak";
pub const LOG_PATH: &str = "/tmp/openclaw-gateway.log";
pub const PAIRING_PATH: &str = "/home/node/.openclaw/credentials/whatsapp/default/creds.json";
pub const GATEWAY_PID: u32 = 4242;

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap_or_default()
}

pub fn mins(m: i64) -> chrono::Duration {
    chrono::Duration::minutes(m)
}

pub fn instance(id: &str) -> Instance {
    Instance {
        id: id.to_string(),
        host: "node-1".to_string(),
        environment: format!("{id}-env"),
        active: true,
    }
}

/// Defaults with fixed paths and no post-start wait.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.supervisor.post_start_delay_secs = 0;
    settings.gateway.config_path = CONFIG_PATH.to_string();
    settings.gateway.log_path = LOG_PATH.to_string();
    settings.gateway.pairing_file = PAIRING_PATH.to_string();
    settings
}

pub fn clean_config() -> serde_json::Value {
    serde_json::json!({
        "channels": {
            "whatsapp": { "enabled": true, "dmPolicy": "allowlist", "allowFrom": ["+15550001"] }
        }
    })
}

/// Config the runtime refuses: an unknown channel key and an incoherent policy.
pub fn dirty_config() -> serde_json::Value {
    serde_json::json!({
        "channels": {
            "whatsapp": {
                "enabled": true,
                "dmPolicy": "allowlist",
                "allowFrom": ["*", "+15550001"],
                "bogusKey": 1
            }
        }
    })
}

// ── Simulated environment ────────────────────────────────────────────────────

/// What happens to the gateway process after a start command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBehavior {
    /// Process comes up and stays up.
    Stays,
    /// Process exits immediately.
    Dies,
    /// Process stays up only if the live config is already sanitized; otherwise
    /// it exits after logging a config error.
    DiesOnDirtyConfig,
}

#[derive(Debug)]
struct EnvState {
    files: HashMap<String, String>,
    running: bool,
    start_behavior: StartBehavior,
    ps_unreachable: bool,
    write_exit_code: i32,
    tamper_writes: bool,
    health: Option<String>,
    channel_status: Option<String>,
    commands: Vec<String>,
    starts: u32,
    reloads: u32,
}

/// One isolated environment reachable through `RemoteExecutor`. Interprets
/// exactly the shell commands the gateway service issues.
pub struct FakeEnvironment {
    state: Mutex<EnvState>,
}

impl Default for FakeEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEnvironment {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EnvState {
                files: HashMap::new(),
                running: false,
                start_behavior: StartBehavior::Stays,
                ps_unreachable: false,
                write_exit_code: 0,
                tamper_writes: false,
                health: None,
                channel_status: None,
                commands: Vec::new(),
                starts: 0,
                reloads: 0,
            }),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut EnvState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn set_running(&self, running: bool) {
        self.with(|s| s.running = running);
    }

    pub fn is_running(&self) -> bool {
        self.with(|s| s.running)
    }

    pub fn set_start_behavior(&self, behavior: StartBehavior) {
        self.with(|s| s.start_behavior = behavior);
    }

    pub fn set_ps_unreachable(&self, unreachable: bool) {
        self.with(|s| s.ps_unreachable = unreachable);
    }

    /// Make every config write exit with `code` after clobbering the file.
    pub fn fail_writes_with(&self, code: i32) {
        self.with(|s| s.write_exit_code = code);
    }

    /// Make writes "succeed" but land different content than requested.
    pub fn tamper_writes(&self) {
        self.with(|s| s.tamper_writes = true);
    }

    pub fn set_health(&self, stdout: &str) {
        self.with(|s| s.health = Some(stdout.to_string()));
    }

    pub fn set_channel_status(&self, stdout: &str) {
        self.with(|s| s.channel_status = Some(stdout.to_string()));
    }

    pub fn put_file(&self, path: &str, content: &str) {
        self.with(|s| s.files.insert(path.to_string(), content.to_string()));
    }

    pub fn put_json(&self, path: &str, value: &serde_json::Value) {
        self.put_file(path, &serde_json::to_string_pretty(value).unwrap_or_default());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.with(|s| s.files.get(path).cloned())
    }

    pub fn json(&self, path: &str) -> Option<serde_json::Value> {
        self.file(path).and_then(|c| serde_json::from_str(&c).ok())
    }

    pub fn commands(&self) -> Vec<String> {
        self.with(|s| s.commands.clone())
    }

    pub fn starts(&self) -> u32 {
        self.with(|s| s.starts)
    }

    pub fn reloads(&self) -> u32 {
        self.with(|s| s.reloads)
    }
}

fn ok(stdout: impl Into<String>) -> ExecOutput {
    ExecOutput {
        exit_code: 0,
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

fn exit(code: i32) -> ExecOutput {
    ExecOutput {
        exit_code: code,
        ..ExecOutput::default()
    }
}

/// Strings between double quotes, in order.
fn quoted(command: &str) -> Vec<&str> {
    command.split('"').skip(1).step_by(2).collect()
}

fn apply_start(s: &mut EnvState) {
    s.starts += 1;
    s.running = match s.start_behavior {
        StartBehavior::Stays => true,
        StartBehavior::Dies => false,
        StartBehavior::DiesOnDirtyConfig => s
            .files
            .get(CONFIG_PATH)
            .and_then(|c| serde_json::from_str::<serde_json::Value>(c).ok())
            .is_some_and(|doc| sanitize(&doc).is_unchanged()),
    };
    if !s.running && s.start_behavior == StartBehavior::DiesOnDirtyConfig {
        let log = s.files.entry(LOG_PATH.to_string()).or_default();
        log.push_str("[gateway] Invalid config: unrecognized key \"bogusKey\"\n");
    }
}

fn interpret(s: &mut EnvState, command: &str) -> Result<ExecOutput> {
    if command.starts_with("ps ") {
        if s.ps_unreachable {
            anyhow::bail!("ssh: connect to host node-1 port 22: Connection refused");
        }
        let mut out = String::from("    1 tini\n   17 node\n");
        if s.running {
            // comm is cut to 15 characters in the process table
            out.push_str(&format!(" {GATEWAY_PID} openclaw-gatewa\n"));
        }
        return Ok(ok(out));
    }
    if command.starts_with("ss ") {
        if s.running {
            return Ok(ok(format!(
                "LISTEN 0 511 127.0.0.1:18789 0.0.0.0:* users:((\"openclaw-gatewa\",pid={GATEWAY_PID},fd=21))\n"
            )));
        }
        return Ok(ok(""));
    }
    if command.starts_with("cat ") {
        let path = quoted(command)[0];
        return Ok(s.files.get(path).map_or_else(
            || ExecOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: format!("cat: {path}: No such file or directory"),
            },
            |c| ok(c.clone()),
        ));
    }
    if command.starts_with("if [ -f ") {
        // copy q[0] -> q[2] if q[0] exists, else remove q[2]
        let q = quoted(command);
        let (src, dst) = (q[0].to_string(), q[2].to_string());
        match s.files.get(&src).cloned() {
            Some(content) => {
                s.files.insert(dst, content);
            }
            None => {
                s.files.remove(&dst);
            }
        }
        return Ok(ok(""));
    }
    if command.starts_with("mkdir -p ") {
        let staging = command
            .rsplit("> \"")
            .next()
            .unwrap_or_default()
            .trim_end_matches('"');
        s.files.insert(staging.to_string(), String::new());
        return Ok(ok(""));
    }
    if command.starts_with("printf '%s' '") {
        let chunk = command
            .split('\'')
            .nth(3)
            .unwrap_or_default()
            .to_string();
        let staging = quoted(command)[0].to_string();
        s.files.entry(staging).or_default().push_str(&chunk);
        return Ok(ok(""));
    }
    if command.starts_with("base64 -d ") {
        let q = quoted(command);
        let (staging, path) = (q[0].to_string(), q[1].to_string());
        if s.write_exit_code != 0 {
            s.files.insert(path, "{\"channels\": {".to_string());
            return Ok(exit(s.write_exit_code));
        }
        let content = if s.tamper_writes {
            "{\"tampered\": true}".to_string()
        } else {
            let encoded = s.files.remove(&staging).unwrap_or_default();
            String::from_utf8(BASE64.decode(encoded)?)?
        };
        s.files.insert(path, content);
        return Ok(ok(""));
    }
    if let Some(pid) = command.strip_prefix("kill -USR1 ") {
        if s.running && pid == GATEWAY_PID.to_string() {
            s.reloads += 1;
            return Ok(ok(""));
        }
        return Ok(exit(1));
    }
    if command.starts_with("kill ") {
        s.running = false;
        if command.contains("nohup ") {
            apply_start(s);
        }
        return Ok(ok(""));
    }
    if command.starts_with("nohup ") {
        apply_start(s);
        return Ok(ok(""));
    }
    if command.starts_with("tail ") {
        let path = quoted(command)[0];
        return Ok(s.files.get(path).map_or_else(|| exit(1), |c| ok(c.clone())));
    }
    if command.starts_with("test -f ") {
        let path = quoted(command)[0];
        return Ok(exit(i32::from(!s.files.contains_key(path))));
    }
    if command.contains("channels status") {
        return Ok(s.channel_status.clone().map_or_else(|| exit(1), |c| ok(c)));
    }
    if command.contains("health") {
        return Ok(s.health.clone().map_or_else(|| exit(1), |c| ok(c)));
    }
    Ok(ExecOutput {
        exit_code: 127,
        stdout: String::new(),
        stderr: format!("sh: unexpected command: {command}"),
    })
}

impl RemoteExecutor for FakeEnvironment {
    async fn execute(
        &self,
        _host: &str,
        _environment: &str,
        command: &str,
        _timeout: Duration,
    ) -> Result<ExecOutput> {
        self.with(|s| {
            s.commands.push(command.to_string());
            interpret(s, command)
        })
    }
}

// ── Registry, audit, clock ───────────────────────────────────────────────────

pub struct RecordingRegistry {
    pub instances: Vec<Instance>,
    statuses: Mutex<Vec<(String, InstanceStatus)>>,
}

impl RecordingRegistry {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self {
            instances,
            statuses: Mutex::new(Vec::new()),
        }
    }

    pub fn last_status(&self, id: &str) -> Option<InstanceStatus> {
        self.statuses
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(i, _)| i == id)
            .map(|(_, s)| *s)
    }
}

impl InstanceRegistry for RecordingRegistry {
    async fn active_instances(&self) -> Result<Vec<Instance>> {
        Ok(self.instances.iter().filter(|i| i.active).cloned().collect())
    }

    async fn record_status(&self, instance_id: &str, status: InstanceStatus) -> Result<()> {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push((instance_id.to_string(), status));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAudit {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn of(&self, action: AuditAction) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.action == action)
            .collect()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, record: &AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Clock the test moves by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|g| *g).unwrap_or_default()
    }
}
