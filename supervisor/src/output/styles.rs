//! Stylesheet keyed by what the supervisor reports, not by message level.

use owo_colors::Style;

use crate::domain::restart_policy::GatewayState;

/// Colors for gateway states and report lines. Plain until [`Styles::colorize`].
#[derive(Default, Clone)]
pub struct Styles {
    /// Running and healthy, or an action that succeeded.
    pub healthy: Style,
    /// Running but unhealthy, crash looping, or a refused restart.
    pub degraded: Style,
    /// Gateway down or an action that failed.
    pub down: Style,
    /// Inconclusive probes and hints.
    pub note: Style,
    /// Field names in key/value lines.
    pub key: Style,
    /// Instance id heading each block.
    pub instance: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.healthy = Style::new().green();
        self.degraded = Style::new().yellow();
        self.down = Style::new().red();
        self.note = Style::new().blue();
        self.key = Style::new().dimmed();
        self.instance = Style::new().bold().cyan();
    }

    #[must_use]
    pub fn for_state(&self, state: GatewayState) -> Style {
        match state {
            GatewayState::RunningHealthy => self.healthy,
            GatewayState::RunningUnhealthy | GatewayState::CrashLooping => self.degraded,
            GatewayState::Down => self.down,
            GatewayState::Unknown => self.note,
        }
    }
}
