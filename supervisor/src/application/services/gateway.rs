//! Gateway probe and control for a single instance.
//!
//! Every call goes through the `RemoteExecutor` port. Probe failures come
//! back as `None` ("unknown"), never as a verdict on the gateway.

use std::time::Duration;

use anyhow::Result;
use supervisor_common::{HealthReport, Instance};

use crate::application::ports::{ExecOutput, RemoteExecutor};
use crate::domain::health::{
    ChannelStatus, GatewayStatus, Probe, STATUS_SOURCES, StatusSource,
    channel_status_from_pairing, channel_status_from_report, find_gateway_pid, find_listen_port,
    parse_json_payload,
};
use crate::domain::settings::GatewaySettings;

/// Process table listing: one `pid comm` pair per line.
pub const PS_COMMAND: &str = "ps -eo pid=,comm=";

/// Listening sockets with owning process, no header.
pub const SS_COMMAND: &str = "ss -ltnpH 2>/dev/null";

/// Handle on one instance's gateway.
pub struct Gateway<'a, E: RemoteExecutor> {
    executor: &'a E,
    instance: &'a Instance,
    settings: &'a GatewaySettings,
    timeout: Duration,
}

impl<'a, E: RemoteExecutor> Gateway<'a, E> {
    pub fn new(
        executor: &'a E,
        instance: &'a Instance,
        settings: &'a GatewaySettings,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            instance,
            settings,
            timeout,
        }
    }

    #[must_use]
    pub fn instance(&self) -> &Instance {
        self.instance
    }

    #[must_use]
    pub fn settings(&self) -> &GatewaySettings {
        self.settings
    }

    /// Run a shell command inside the instance's isolated environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the executor could not run the command at all.
    pub async fn run(&self, command: &str) -> Result<ExecOutput> {
        tracing::debug!(instance = %self.instance.id, command, "remote exec");
        self.executor
            .execute(
                &self.instance.host,
                &self.instance.environment,
                command,
                self.timeout,
            )
            .await
    }

    // ── Probes ────────────────────────────────────────────────────────────────

    /// Whether the gateway process is alive. `None` when the process table
    /// could not be read.
    pub async fn get_status(&self) -> Option<GatewayStatus> {
        let output = match self.run(PS_COMMAND).await {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(instance = %self.instance.id, error = %format!("{e:#}"), "process table probe failed");
                return None;
            }
        };
        if !output.success() || output.stdout.trim().is_empty() {
            tracing::warn!(
                instance = %self.instance.id,
                exit_code = output.exit_code,
                "process table probe inconclusive"
            );
            return None;
        }
        let Some(pid) = find_gateway_pid(&output.stdout, &self.settings.process_name) else {
            return Some(GatewayStatus::stopped());
        };
        Some(GatewayStatus {
            running: true,
            pid: Some(pid),
            port: self.listen_port(pid).await,
        })
    }

    async fn listen_port(&self, pid: u32) -> Option<u16> {
        let output = self.run(SS_COMMAND).await.ok()?;
        find_listen_port(&output.stdout, pid)
    }

    /// Runtime health report, or `None` if the query failed or did not
    /// produce a parseable payload.
    pub async fn get_health(&self) -> Option<HealthReport> {
        match self.run(&self.settings.health_command).await {
            // The health command exits nonzero when unhealthy but still prints
            // the payload, so the exit code is not consulted.
            Ok(output) => parse_json_payload(&output.stdout),
            Err(e) => {
                tracing::warn!(instance = %self.instance.id, error = %format!("{e:#}"), "health probe failed");
                None
            }
        }
    }

    /// Status of the watched channel from the first conclusive source:
    /// live status call, then the health report, then the pairing file.
    pub async fn get_channel_status(&self, health: Option<&HealthReport>) -> Option<ChannelStatus> {
        for source in STATUS_SOURCES {
            match self.probe_source(source, health).await {
                Probe::Conclusive(status) => return Some(status),
                Probe::Inconclusive => {
                    tracing::debug!(instance = %self.instance.id, ?source, "channel status source inconclusive");
                }
            }
        }
        None
    }

    async fn probe_source(
        &self,
        source: StatusSource,
        health: Option<&HealthReport>,
    ) -> Probe<ChannelStatus> {
        let channel = self.settings.watched_channel.as_str();
        match source {
            StatusSource::LiveStatus => {
                let Ok(output) = self.run(&self.settings.channel_status_command).await else {
                    return Probe::Inconclusive;
                };
                parse_json_payload::<HealthReport>(&output.stdout).map_or(Probe::Inconclusive, |r| {
                    channel_status_from_report(&r, channel, source)
                })
            }
            StatusSource::HealthReport => health.map_or(Probe::Inconclusive, |r| {
                channel_status_from_report(r, channel, source)
            }),
            StatusSource::PairingFile => {
                let command = format!("test -f \"{}\"", self.settings.pairing_file);
                match self.run(&command).await.map(|o| o.exit_code) {
                    Ok(0) => Probe::Conclusive(channel_status_from_pairing(true)),
                    Ok(1) => Probe::Conclusive(channel_status_from_pairing(false)),
                    _ => Probe::Inconclusive,
                }
            }
        }
    }

    /// Last lines of the gateway log, if readable.
    pub async fn log_tail(&self) -> Option<String> {
        let command = format!(
            "tail -n {} \"{}\"",
            self.settings.log_tail_lines, self.settings.log_path
        );
        self.run(&command)
            .await
            .ok()
            .filter(ExecOutput::success)
            .map(|o| o.stdout)
    }

    // ── Control ───────────────────────────────────────────────────────────────

    /// Start the gateway detached, appending its output to the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the executor could not run the command.
    pub async fn start(&self) -> Result<ExecOutput> {
        self.run(&self.start_command()).await
    }

    /// Terminate `pid`, give it a moment to release its port, then start again.
    ///
    /// # Errors
    ///
    /// Returns an error if the executor could not run the command.
    pub async fn restart(&self, pid: Option<u32>) -> Result<ExecOutput> {
        let command = match pid {
            Some(pid) => format!("kill {pid} 2>/dev/null; sleep 2; {}", self.start_command()),
            None => self.start_command(),
        };
        self.run(&command).await
    }

    fn start_command(&self) -> String {
        format!(
            "nohup {} >> \"{}\" 2>&1 < /dev/null &",
            self.settings.start_command, self.settings.log_path
        )
    }

    /// Ask a running gateway to reload its config (`SIGUSR1`).
    ///
    /// Fire-and-forget: returns whether a signal was sent, and a missing
    /// process is not an error.
    pub async fn reload(&self) -> bool {
        let Some(pid) = self.get_status().await.and_then(|s| s.pid) else {
            tracing::debug!(instance = %self.instance.id, "no running gateway to reload");
            return false;
        };
        let sent = self
            .run(&format!("kill -USR1 {pid}"))
            .await
            .is_ok_and(|o| o.success());
        tracing::debug!(instance = %self.instance.id, pid, sent, "reload signal");
        sent
    }
}
