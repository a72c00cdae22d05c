//! Run command: the supervisor loop until SIGINT/SIGTERM.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::supervisor::{HealthStateStore, Supervisor};
use crate::infra::clock::SystemClock;

/// Entry point for `gateway-supervisor run`.
///
/// A sweep in flight when the signal arrives is allowed to finish.
///
/// # Errors
///
/// Currently infallible once settings have loaded.
pub async fn run(app: &AppContext) -> Result<()> {
    let executor = app.executor();
    let registry = app.registry();
    let audit = app.audit_sink();
    let clock = SystemClock;
    let supervisor = Supervisor::new(&executor, &registry, &audit, &clock, &app.settings);

    app.output.note(format_args!(
        "supervising instances from {} every {}s",
        app.settings.files.instances.display(),
        app.settings.supervisor.tick_interval_secs
    ));

    let mut store = HealthStateStore::new();
    supervisor.run(&mut store, shutdown_signal()).await;

    app.output.ok("supervisor stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown requested");
}
