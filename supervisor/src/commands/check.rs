//! Check command: one sweep (or one instance tick) with a report per instance.
//!
//! Starts from empty health state, so cooldowns and crash counts from a
//! running `run` loop are not visible here.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::supervisor::{HealthStateStore, Supervisor};
use crate::infra::clock::SystemClock;
use crate::output::json;

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Only tick this instance
    #[arg(long)]
    pub instance: Option<String>,
}

/// Entry point for `gateway-supervisor check`.
///
/// # Errors
///
/// Returns an error if `--instance` names no active instance, or JSON
/// output fails.
pub async fn run(app: &AppContext, args: &CheckArgs) -> Result<()> {
    let executor = app.executor();
    let registry = app.registry();
    let audit = app.audit_sink();
    let clock = SystemClock;
    let supervisor = Supervisor::new(&executor, &registry, &audit, &clock, &app.settings);

    let mut store = HealthStateStore::new();
    let reports = match &args.instance {
        Some(id) => vec![supervisor.tick_one(&mut store, id).await?],
        None => supervisor.sweep(&mut store).await,
    };

    if app.is_json() {
        return json::print(&reports);
    }
    if reports.is_empty() {
        app.output.note("no active instances");
    }
    for report in &reports {
        app.output.tick_report(report);
    }
    Ok(())
}
