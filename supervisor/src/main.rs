//! gateway-supervisor - keeps agent gateways running and their configuration sane

use clap::Parser;
use gateway_supervisor::output::OutputContext;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    let output = OutputContext::new(cli.no_color, cli.quiet);
    if let Err(e) = cli.run().await {
        let message = format!("{e:#}");
        match json.then(|| gateway_supervisor::output::json::format_error(&message, "command_failed")) {
            Some(Ok(text)) => println!("{text}"),
            _ => output.failure(format!("Error: {message}")),
        }
        std::process::exit(1);
    }
}
