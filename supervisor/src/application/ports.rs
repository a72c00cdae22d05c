//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `supervisor_common`; never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use supervisor_common::{AuditRecord, Instance, InstanceStatus};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Result of one remote command. A nonzero exit code is a normal result,
/// not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code; `-1` when the command was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl From<Output> for ExecOutput {
    fn from(output: Output) -> Self {
        Self {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

// ── Remote Execution Port ─────────────────────────────────────────────────────

/// Runs a shell command inside a named isolated environment on a named host.
///
/// Never retried internally. Implementations return `Err` only when the
/// command could not be run at all (spawn failure, timeout).
#[allow(async_fn_in_trait)]
pub trait RemoteExecutor {
    async fn execute(
        &self,
        host: &str,
        environment: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output. Any exit status is `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<Output>;
}

// ── Persistence Port ──────────────────────────────────────────────────────────

/// The set of supervised instances and where their status is recorded.
#[allow(async_fn_in_trait)]
pub trait InstanceRegistry {
    /// Instances to supervise this sweep.
    async fn active_instances(&self) -> Result<Vec<Instance>>;
    /// Persist the gateway status observed for an instance.
    async fn record_status(&self, instance_id: &str, status: InstanceStatus) -> Result<()>;
}

// ── Audit Port ────────────────────────────────────────────────────────────────

/// Receives one record per restart attempt and per configuration repair.
/// Sync trait: sinks must not fail the caller.
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink {
    fn record(&self, record: &AuditRecord);
}

// ── Clock Port ────────────────────────────────────────────────────────────────

/// Source of "now" for every policy decision.
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}
