//! Human output for supervisor commands.
//!
//! Commands hand results to [`OutputContext`]; the wording lives in
//! [`report`] and the colors in [`styles`].

pub mod json;
pub mod report;
pub mod styles;

use std::fmt::Display;

use console::Term;
use owo_colors::{OwoColorize as _, Style};
use supervisor_common::{HealthReport, Instance};

use crate::application::services::supervisor::TickReport;
use crate::domain::health::{ChannelStatus, GatewayStatus};
use crate::domain::restart_policy::GatewayState;
pub use styles::Styles;

/// Where human output goes and how it looks. Everything except
/// [`OutputContext::failure`] is suppressed when `quiet`.
pub struct OutputContext {
    pub styles: Styles,
    pub quiet: bool,
}

impl OutputContext {
    /// Colors only on a terminal, and never with `--no-color` or `NO_COLOR`.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let mut styles = Styles::default();
        if !no_color && Term::stdout().is_term() && std::env::var("NO_COLOR").is_err() {
            styles.colorize();
        }
        Self { styles, quiet }
    }

    fn mark(&self, symbol: &str, style: Style, msg: impl Display) {
        if !self.quiet {
            println!("  {} {msg}", symbol.style(style));
        }
    }

    pub fn ok(&self, msg: impl Display) {
        self.mark("✓", self.styles.healthy, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.mark("⚠", self.styles.degraded, msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.mark("ℹ", self.styles.note, msg);
    }

    /// To stderr, even when quiet.
    pub fn failure(&self, msg: impl Display) {
        eprintln!("  {} {msg}", "✗".style(self.styles.down));
    }

    pub fn field(&self, key: &str, value: impl Display) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.key));
        }
    }

    fn heading(&self, id: &str) {
        if !self.quiet {
            println!("  {}", id.style(self.styles.instance));
        }
    }

    // ── Supervisor results ──────────────────────────────────────────────────

    pub fn tick_report(&self, report: &TickReport) {
        self.heading(&report.instance_id);
        let symbol = if report.state == GatewayState::RunningHealthy { "✓" } else { "⚠" };
        self.mark(
            symbol,
            self.styles.for_state(report.state),
            report::state_text(report.state),
        );
        if let Some(attempt) = report.restart {
            self.field("restart", report::attempt_text(attempt));
        }
        if let Some(attempt) = report.repair {
            self.field("repair", report::attempt_text(attempt));
        }
        if let Some(denied) = report.denied {
            self.field("restart denied", report::denied_text(denied));
        }
        self.field("restarts this hour", report.health.restarts_this_hour);
    }

    pub fn instance(&self, instance: &Instance) {
        self.heading(&instance.id);
        self.field("host", &instance.host);
        self.field("environment", &instance.environment);
    }

    pub fn gateway_status(&self, status: Option<&GatewayStatus>) {
        match status {
            None => self.mark("?", self.styles.note, "gateway status unknown (probe failed)"),
            Some(s) if s.running => self.ok(report::running_text(s)),
            Some(_) => self.mark("✗", self.styles.down, "gateway not running"),
        }
    }

    pub fn health(&self, health: Option<&HealthReport>) {
        match health {
            Some(h) if h.ok => self.ok("health ok"),
            Some(_) => self.warn("health reports not ok"),
            None => self.note("health unknown"),
        }
    }

    pub fn channel(&self, name: &str, status: Option<&ChannelStatus>) {
        match status {
            Some(c) => self.field(name, report::channel_text(c)),
            None => self.field(name, "unknown"),
        }
    }

    /// One line per sanitize change, under `label`.
    pub fn changes<T: Display>(&self, label: &str, changes: &[T]) {
        for change in changes {
            self.field(label, change);
        }
    }
}
