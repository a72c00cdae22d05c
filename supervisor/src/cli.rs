//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use gateway_supervisor::app::{AppContext, OutputFlags};
use gateway_supervisor::commands;

/// Keeps agent gateways running and their configuration sane
#[derive(Parser)]
#[command(
    name = "gateway-supervisor",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(long, global = true, env = "GATEWAY_SUPERVISOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the supervisor loop until interrupted
    Run,

    /// Run one sweep and report what it did
    Check(commands::check::CheckArgs),

    /// Show gateway, health and channel status for one instance
    Status(commands::status::StatusArgs),

    /// Repair one instance's gateway configuration now
    Repair(commands::repair::RepairArgs),

    /// Sanitize a local gateway configuration file
    Sanitize(commands::sanitize::SanitizeArgs),
}

impl Cli {
    /// Default log level when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet || self.json {
            "warn"
        } else {
            "info"
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if settings cannot be loaded or the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            config,
            json,
            quiet,
            no_color,
            command,
            ..
        } = self;
        let flags = OutputFlags {
            no_color,
            quiet,
            json,
        };
        match command {
            Command::Sanitize(args) => {
                commands::sanitize::run(&flags.context(), flags.mode(), &args)
            }
            Command::Run => commands::run::run(&AppContext::new(&flags, config)?).await,
            Command::Check(args) => {
                commands::check::run(&AppContext::new(&flags, config)?, &args).await
            }
            Command::Status(args) => {
                commands::status::run(&AppContext::new(&flags, config)?, &args).await
            }
            Command::Repair(args) => {
                commands::repair::run(&AppContext::new(&flags, config)?, &args).await
            }
        }
    }
}
