//! Repair command: sanitize and rewrite one instance's gateway config now.
//!
//! Bypasses the repair-storm throttle. Always writes an audit record.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use supervisor_common::{AuditAction, AuditReason, AuditRecord};

use crate::app::AppContext;
use crate::application::ports::AuditSink;
use crate::application::services::config_safeguard::ConfigSafeguard;
use crate::application::services::gateway::Gateway;
use crate::commands::find_instance;
use crate::output::json;

/// Arguments for the repair command.
#[derive(Args)]
pub struct RepairArgs {
    /// Instance id from the instances file
    pub instance: String,
}

#[derive(Debug, Serialize)]
struct RepairView<'a> {
    instance: &'a str,
    changes: Vec<String>,
}

/// Entry point for `gateway-supervisor repair`.
///
/// # Errors
///
/// Returns an error if the instance is unknown or the repair failed.
pub async fn run(app: &AppContext, args: &RepairArgs) -> Result<()> {
    let registry = app.registry();
    let instance = find_instance(&registry, &args.instance).await?;
    let executor = app.executor();
    let gateway = Gateway::new(
        &executor,
        &instance,
        &app.settings.gateway,
        app.settings.supervisor.exec_timeout(),
    );

    let result = ConfigSafeguard::new(&gateway).repair().await;
    app.audit_sink().record(&AuditRecord {
        instance_id: instance.id.clone(),
        action: AuditAction::ConfigRepair,
        success: result.is_ok(),
        reason: AuditReason::Manual,
        at: Utc::now(),
    });

    let sanitized = result.map_err(|e| anyhow::anyhow!("repair of '{}' failed: {e}", instance.id))?;
    let changes: Vec<String> = sanitized.changes.iter().map(ToString::to_string).collect();

    if app.is_json() {
        return json::print(&RepairView {
            instance: &instance.id,
            changes,
        });
    }
    if changes.is_empty() {
        app.output.ok("config already clean; nothing written");
    } else {
        app.output.changes("changed", &changes);
        app.output.ok("config repaired");
    }
    Ok(())
}
