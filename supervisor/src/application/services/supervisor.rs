//! Supervisor loop: one sweep per tick across all active instances.
//!
//! Per instance: probe, apply the restart policy, and repair the config when
//! a crash loop is detected. Nothing here returns an error to the caller;
//! every failure is logged and retried on the next tick.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use supervisor_common::{AuditAction, AuditReason, AuditRecord, Instance, InstanceStatus};
use tokio::time::MissedTickBehavior;

use crate::application::ports::{AuditSink, Clock, InstanceRegistry, RemoteExecutor};
use crate::application::services::config_safeguard::ConfigSafeguard;
use crate::application::services::gateway::Gateway;
use crate::domain::health::log_shows_config_error;
use crate::domain::restart_policy::{
    GatewayState, InstanceHealthState, Liveness, RestartDenied, RestartPolicy,
};
use crate::domain::settings::{GatewaySettings, Settings};

// ── State store ───────────────────────────────────────────────────────────────

/// Health state for every instance seen so far, keyed by instance id.
///
/// Entries are created on first sight and left in place (inert) when an
/// instance stops appearing in the active set.
#[derive(Debug, Default)]
pub struct HealthStateStore {
    states: HashMap<String, InstanceHealthState>,
}

impl HealthStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, instance_id: &str) -> Option<&InstanceHealthState> {
        self.states.get(instance_id)
    }

    pub fn insert(&mut self, instance_id: impl Into<String>, state: InstanceHealthState) {
        self.states.insert(instance_id.into(), state);
    }

    /// Check out an instance's state for the duration of one tick.
    fn take(&mut self, instance_id: &str) -> InstanceHealthState {
        self.states.remove(instance_id).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// A restart or repair the tick attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub reason: AuditReason,
    pub succeeded: bool,
}

/// What one tick observed and did for one instance.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub instance_id: String,
    pub state: GatewayState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<Attempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<Attempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied: Option<RestartDenied>,
    pub health: InstanceHealthState,
}

impl TickReport {
    fn new(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            state: GatewayState::Unknown,
            restart: None,
            repair: None,
            denied: None,
            health: InstanceHealthState::default(),
        }
    }
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// The control loop. Borrows its collaborators; owns only policy and timing.
pub struct Supervisor<'a, E, R, A, C> {
    executor: &'a E,
    registry: &'a R,
    audit: &'a A,
    clock: &'a C,
    policy: RestartPolicy,
    gateway: GatewaySettings,
    tick_interval: Duration,
    post_start_delay: Duration,
    exec_timeout: Duration,
}

impl<'a, E, R, A, C> Supervisor<'a, E, R, A, C>
where
    E: RemoteExecutor,
    R: InstanceRegistry,
    A: AuditSink,
    C: Clock,
{
    pub fn new(executor: &'a E, registry: &'a R, audit: &'a A, clock: &'a C, settings: &Settings) -> Self {
        Self {
            executor,
            registry,
            audit,
            clock,
            policy: RestartPolicy::from(&settings.policy),
            gateway: settings.gateway.clone(),
            tick_interval: settings.supervisor.tick_interval(),
            post_start_delay: settings.supervisor.post_start_delay(),
            exec_timeout: settings.supervisor.exec_timeout(),
        }
    }

    /// Run sweeps on a fixed period until `shutdown` resolves.
    ///
    /// A sweep in flight when shutdown is requested finishes normally.
    pub async fn run(&self, store: &mut HealthStateStore, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        tracing::info!(
            tick_secs = self.tick_interval.as_secs(),
            max_restarts_per_hour = self.policy.max_restarts_per_hour,
            "supervisor started"
        );
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("supervisor stopped");
                    break;
                }
                _ = interval.tick() => {
                    let reports = self.sweep(store).await;
                    tracing::debug!(instances = reports.len(), "sweep finished");
                }
            }
        }
    }

    /// Tick every active instance once, concurrently. Each instance's state
    /// is checked out of `store` for its tick, so no two ticks share state.
    pub async fn sweep(&self, store: &mut HealthStateStore) -> Vec<TickReport> {
        let instances = match self.registry.active_instances().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "listing active instances failed");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let ticks: Vec<_> = instances
            .into_iter()
            .filter(|i| seen.insert(i.id.clone()))
            .map(|instance| {
                let mut state = store.take(&instance.id);
                async move {
                    let report = self.tick(&instance, &mut state).await;
                    (instance.id, state, report)
                }
            })
            .collect();

        join_all(ticks)
            .await
            .into_iter()
            .map(|(id, state, report)| {
                store.insert(id, state);
                report
            })
            .collect()
    }

    /// Tick a single active instance by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or the instance is not
    /// in the active set.
    pub async fn tick_one(&self, store: &mut HealthStateStore, instance_id: &str) -> Result<TickReport> {
        let instance = self
            .registry
            .active_instances()
            .await?
            .into_iter()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| anyhow::anyhow!("no active instance '{instance_id}'"))?;
        let mut state = store.take(instance_id);
        let report = self.tick(&instance, &mut state).await;
        store.insert(instance_id, state);
        Ok(report)
    }

    /// One tick for one instance.
    pub async fn tick(&self, instance: &Instance, state: &mut InstanceHealthState) -> TickReport {
        let now = self.clock.now();
        state.roll_hour_window(now, &self.policy);
        let gateway = Gateway::new(self.executor, instance, &self.gateway, self.exec_timeout);
        let mut report = TickReport::new(&instance.id);

        match gateway.get_status().await {
            None => {
                tracing::warn!(instance = %instance.id, "gateway status unknown; skipping this tick");
            }
            Some(status) if status.running => {
                self.tick_running(&gateway, status.pid, state, now, &mut report)
                    .await;
            }
            Some(_) => self.tick_down(&gateway, state, now, &mut report).await,
        }

        report.health = state.clone();
        report
    }

    async fn tick_running(
        &self,
        gateway: &Gateway<'_, E>,
        pid: Option<u32>,
        state: &mut InstanceHealthState,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let id = &gateway.instance().id;
        state.observe(Liveness::Alive, now, &self.policy);
        self.record_status(id, InstanceStatus::Running).await;

        let health = gateway.get_health().await;
        report.state = match &health {
            Some(h) if h.ok => GatewayState::RunningHealthy,
            Some(_) => {
                tracing::warn!(instance = %id, "gateway running but reports unhealthy");
                GatewayState::RunningUnhealthy
            }
            None => {
                tracing::warn!(instance = %id, "gateway running; health unknown");
                GatewayState::RunningUnhealthy
            }
        };

        let channel = gateway.get_channel_status(health.as_ref()).await;
        let Some(connected) = channel.as_ref().and_then(|c| c.connected) else {
            tracing::debug!(instance = %id, "channel connectivity unknown");
            return;
        };

        if state.was_connected && !connected {
            tracing::warn!(
                instance = %id,
                channel = %self.gateway.watched_channel,
                "channel disconnected"
            );
            match state.check_restart(now, &self.policy) {
                Ok(()) => {
                    self.restart(gateway, pid, state, now, AuditReason::ChannelDisconnected, report)
                        .await;
                }
                Err(denied) => self.deny(id, denied, state, report),
            }
        }
        state.was_connected = connected;
    }

    async fn tick_down(
        &self,
        gateway: &Gateway<'_, E>,
        state: &mut InstanceHealthState,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let id = &gateway.instance().id;
        state.observe(Liveness::FoundDown, now, &self.policy);
        self.record_status(id, InstanceStatus::Stopped).await;

        if state.is_crash_looping(&self.policy) {
            report.state = GatewayState::CrashLooping;
            tracing::warn!(instance = %id, consecutive_crashes = state.consecutive_crashes, "crash loop detected");
            if state.may_repair(now, &self.policy) {
                let succeeded = self.repair(gateway, state, now, AuditReason::CrashLoop).await;
                report.repair = Some(Attempt {
                    reason: AuditReason::CrashLoop,
                    succeeded,
                });
            } else {
                tracing::info!(instance = %id, "config repair throttled");
            }
        } else {
            report.state = GatewayState::Down;
        }

        if let Err(denied) = state.check_restart(now, &self.policy) {
            self.deny(id, denied, state, report);
            return;
        }
        self.restart(gateway, None, state, now, AuditReason::ProcessDown, report)
            .await;
    }

    fn deny(&self, id: &str, denied: RestartDenied, state: &InstanceHealthState, report: &mut TickReport) {
        tracing::warn!(
            instance = %id,
            ?denied,
            restarts_this_hour = state.restarts_this_hour,
            max_restarts_per_hour = self.policy.max_restarts_per_hour,
            "restart not permitted; will re-evaluate next tick"
        );
        report.denied = Some(denied);
    }

    /// One restart attempt: start, confirm it held, and if it died at once
    /// with a config error in the log, repair and start exactly once more.
    async fn restart(
        &self,
        gateway: &Gateway<'_, E>,
        pid: Option<u32>,
        state: &mut InstanceHealthState,
        now: DateTime<Utc>,
        reason: AuditReason,
        report: &mut TickReport,
    ) {
        let id = &gateway.instance().id;
        state.record_restart(now, &self.policy);
        tracing::info!(
            instance = %id,
            reason = reason.code(),
            restarts_this_hour = state.restarts_this_hour,
            "restarting gateway"
        );
        if let Err(e) = gateway.restart(pid).await {
            tracing::warn!(instance = %id, error = %format!("{e:#}"), "gateway start command failed");
        }

        let mut held = self.confirm_running(gateway, state, now).await;
        if !held && self.config_error_logged(gateway).await && state.may_repair(now, &self.policy) {
            let repaired = self
                .repair(gateway, state, now, AuditReason::ConfigErrorInLog)
                .await;
            report.repair = Some(Attempt {
                reason: AuditReason::ConfigErrorInLog,
                succeeded: repaired,
            });
            if repaired {
                tracing::info!(instance = %id, "retrying gateway start after config repair");
                if let Err(e) = gateway.start().await {
                    tracing::warn!(instance = %id, error = %format!("{e:#}"), "gateway start command failed");
                }
                held = self.confirm_running(gateway, state, now).await;
            }
        }

        if held {
            tracing::info!(instance = %id, "gateway restarted");
        } else {
            tracing::warn!(instance = %id, consecutive_crashes = state.consecutive_crashes, "gateway did not stay up");
        }
        let status = if held {
            InstanceStatus::Running
        } else {
            InstanceStatus::Stopped
        };
        self.record_status(id, status).await;
        self.audit.record(&AuditRecord {
            instance_id: id.clone(),
            action: AuditAction::GatewayRestart,
            success: held,
            reason,
            at: now,
        });
        report.restart = Some(Attempt {
            reason,
            succeeded: held,
        });
    }

    /// Wait, re-probe, and feed the result into the crash counter.
    async fn confirm_running(
        &self,
        gateway: &Gateway<'_, E>,
        state: &mut InstanceHealthState,
        now: DateTime<Utc>,
    ) -> bool {
        tokio::time::sleep(self.post_start_delay).await;
        match gateway.get_status().await {
            Some(s) if s.running => {
                state.observe(Liveness::Alive, now, &self.policy);
                true
            }
            Some(_) => {
                state.observe(Liveness::DiedAfterStart, now, &self.policy);
                false
            }
            None => false,
        }
    }

    async fn config_error_logged(&self, gateway: &Gateway<'_, E>) -> bool {
        gateway
            .log_tail()
            .await
            .is_some_and(|tail| log_shows_config_error(&tail))
    }

    async fn repair(
        &self,
        gateway: &Gateway<'_, E>,
        state: &mut InstanceHealthState,
        now: DateTime<Utc>,
        reason: AuditReason,
    ) -> bool {
        let id = &gateway.instance().id;
        let succeeded = match ConfigSafeguard::new(gateway).repair().await {
            Ok(sanitized) => {
                tracing::info!(instance = %id, changes = sanitized.changes.len(), reason = reason.code(), "gateway config repaired");
                true
            }
            Err(e) => {
                tracing::warn!(instance = %id, error = %e, reason = reason.code(), "gateway config repair failed");
                false
            }
        };
        state.record_repair(now, succeeded);
        self.audit.record(&AuditRecord {
            instance_id: id.clone(),
            action: AuditAction::ConfigRepair,
            success: succeeded,
            reason,
            at: now,
        });
        succeeded
    }

    async fn record_status(&self, instance_id: &str, status: InstanceStatus) {
        if let Err(e) = self.registry.record_status(instance_id, status).await {
            tracing::warn!(instance = %instance_id, error = %format!("{e:#}"), "recording status failed");
        }
    }
}
