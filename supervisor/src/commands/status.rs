//! Status command: probe one instance's gateway without acting on it.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use supervisor_common::HealthReport;

use crate::app::AppContext;
use crate::application::services::gateway::Gateway;
use crate::commands::find_instance;
use crate::domain::health::{ChannelStatus, GatewayStatus};
use crate::output::json;

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Instance id from the instances file
    pub instance: String,
}

/// Everything the probes learned; `None` means the probe was inconclusive.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub instance: String,
    pub gateway: Option<GatewayStatus>,
    pub health: Option<HealthReport>,
    pub channel: Option<ChannelStatus>,
}

/// Entry point for `gateway-supervisor status`.
///
/// # Errors
///
/// Returns an error if the instance is unknown or JSON output fails.
pub async fn run(app: &AppContext, args: &StatusArgs) -> Result<()> {
    let registry = app.registry();
    let instance = find_instance(&registry, &args.instance).await?;
    let executor = app.executor();
    let gateway = Gateway::new(
        &executor,
        &instance,
        &app.settings.gateway,
        app.settings.supervisor.exec_timeout(),
    );

    let status = gateway.get_status().await;
    let running = status.is_some_and(|s| s.running);
    let health = if running { gateway.get_health().await } else { None };
    let channel = if running {
        gateway.get_channel_status(health.as_ref()).await
    } else {
        None
    };
    let view = StatusView {
        instance: instance.id.clone(),
        gateway: status,
        health,
        channel,
    };

    if app.is_json() {
        return json::print(&view);
    }

    let ctx = &app.output;
    ctx.instance(&instance);
    ctx.gateway_status(view.gateway.as_ref());
    if running {
        ctx.health(view.health.as_ref());
        ctx.channel(&app.settings.gateway.watched_channel, view.channel.as_ref());
    }
    Ok(())
}
