//! Per-instance health state and the bounded restart / repair policy.
//!
//! Pure data and transitions; the supervisor service owns the instances of
//! [`InstanceHealthState`] and is the only code that mutates them.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::settings::PolicySettings;

// ── Policy ───────────────────────────────────────────────────────────────────

/// Limits shared by every restart path (process death and channel
/// disconnection draw from the same budget and cooldown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts_per_hour: u32,
    pub cooldown: Duration,
    pub hour_window: Duration,
    pub crash_loop_threshold: u32,
    pub repair_throttle: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::from(&PolicySettings::default())
    }
}

impl From<&PolicySettings> for RestartPolicy {
    fn from(s: &PolicySettings) -> Self {
        Self {
            max_restarts_per_hour: s.max_restarts_per_hour,
            cooldown: seconds(s.restart_cooldown_secs),
            hour_window: seconds(s.hour_window_secs),
            crash_loop_threshold: s.crash_loop_threshold,
            repair_throttle: seconds(s.repair_throttle_secs),
        }
    }
}

/// Saturates at `Duration::MAX` instead of panicking on huge values.
fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Why a restart was refused this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartDenied {
    /// Last restart is more recent than the cooldown.
    Cooldown,
    /// Hourly restart budget exhausted.
    HourlyCap,
}

/// What the supervisor just learned about the gateway process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Process seen running for a full tick.
    Alive,
    /// Process absent at the start of a tick.
    FoundDown,
    /// Process absent right after the supervisor started it.
    DiedAfterStart,
}

/// Inferred gateway state, used in tick reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayState {
    RunningHealthy,
    RunningUnhealthy,
    Down,
    CrashLooping,
    Unknown,
}

// ── State ────────────────────────────────────────────────────────────────────

/// In-memory health bookkeeping for one instance.
///
/// Created lazily the first time an instance is seen; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceHealthState {
    pub was_connected: bool,
    pub last_restart_at: Option<DateTime<Utc>>,
    pub restarts_this_hour: u32,
    pub hour_window_start: Option<DateTime<Utc>>,
    pub consecutive_crashes: u32,
    pub last_config_sanitize_at: Option<DateTime<Utc>>,
}

impl InstanceHealthState {
    /// Reset the hourly counter once the window has elapsed.
    pub fn roll_hour_window(&mut self, now: DateTime<Utc>, policy: &RestartPolicy) {
        match self.hour_window_start {
            Some(start) if now - start <= policy.hour_window => {}
            _ => {
                self.hour_window_start = Some(now);
                self.restarts_this_hour = 0;
            }
        }
    }

    /// Whether the last restart happened less than one cooldown ago.
    #[must_use]
    pub fn within_cooldown(&self, now: DateTime<Utc>, policy: &RestartPolicy) -> bool {
        self.last_restart_at
            .is_some_and(|at| now - at < policy.cooldown)
    }

    /// The shared restart predicate: under the hourly cap and out of cooldown.
    ///
    /// # Errors
    ///
    /// Returns the reason the restart is refused.
    pub fn check_restart(
        &mut self,
        now: DateTime<Utc>,
        policy: &RestartPolicy,
    ) -> Result<(), RestartDenied> {
        self.roll_hour_window(now, policy);
        if self.restarts_this_hour >= policy.max_restarts_per_hour {
            return Err(RestartDenied::HourlyCap);
        }
        if self.within_cooldown(now, policy) {
            return Err(RestartDenied::Cooldown);
        }
        Ok(())
    }

    /// Stamp a restart attempt against the hourly budget.
    pub fn record_restart(&mut self, now: DateTime<Utc>, policy: &RestartPolicy) {
        self.roll_hour_window(now, policy);
        self.last_restart_at = Some(now);
        self.restarts_this_hour += 1;
    }

    /// Single transition for every liveness observation.
    pub fn observe(&mut self, liveness: Liveness, now: DateTime<Utc>, policy: &RestartPolicy) {
        match liveness {
            Liveness::Alive => self.consecutive_crashes = 0,
            Liveness::FoundDown => {
                if self.within_cooldown(now, policy) {
                    self.consecutive_crashes += 1;
                }
            }
            Liveness::DiedAfterStart => self.consecutive_crashes += 1,
        }
    }

    #[must_use]
    pub fn is_crash_looping(&self, policy: &RestartPolicy) -> bool {
        self.consecutive_crashes >= policy.crash_loop_threshold
    }

    /// Repair-storm guard: at most one repair attempt per throttle window.
    #[must_use]
    pub fn may_repair(&self, now: DateTime<Utc>, policy: &RestartPolicy) -> bool {
        self.last_config_sanitize_at
            .is_none_or(|at| now - at > policy.repair_throttle)
    }

    /// Stamp a repair attempt, successful or not.
    pub fn record_repair(&mut self, now: DateTime<Utc>, succeeded: bool) {
        self.last_config_sanitize_at = Some(now);
        if succeeded {
            self.consecutive_crashes = 0;
        }
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
