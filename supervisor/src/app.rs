//! Application context: settings and output state shared by the commands
//! that talk to instances.
//!
//! Adapters are built on demand from the loaded settings so each command
//! only constructs what it uses.

use std::path::PathBuf;

use anyhow::Result;

use crate::domain::settings::Settings;
use crate::infra::audit::JsonlAuditSink;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::registry::FileInstanceRegistry;
use crate::infra::remote_executor::TemplateExecutor;
use crate::infra::settings::YamlSettingsStore;
use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

impl OutputFlags {
    #[must_use]
    pub fn mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    #[must_use]
    pub fn context(&self) -> OutputContext {
        OutputContext::new(self.no_color, self.quiet)
    }
}

/// Unified context passed to every instance-facing command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Validated settings with file paths already resolved.
    pub settings: Settings,
    /// Where the settings were loaded from.
    pub settings_path: PathBuf,
}

impl AppContext {
    /// Load settings and build the output context.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be located, read, parsed, or
    /// validated.
    pub fn new(flags: &OutputFlags, config: Option<PathBuf>) -> Result<Self> {
        let store = YamlSettingsStore::resolve(config)?;
        let settings = store.load()?;
        tracing::debug!(path = %store.path().display(), "settings loaded");
        Ok(Self {
            output: flags.context(),
            mode: flags.mode(),
            settings,
            settings_path: store.path().to_path_buf(),
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    #[must_use]
    pub fn executor(&self) -> TemplateExecutor<TokioCommandRunner> {
        TemplateExecutor::new(
            TokioCommandRunner,
            self.settings.executor.clone(),
        )
    }

    #[must_use]
    pub fn registry(&self) -> FileInstanceRegistry {
        FileInstanceRegistry::new(
            self.settings.files.instances.clone(),
            self.settings.files.status.clone(),
        )
    }

    #[must_use]
    pub fn audit_sink(&self) -> JsonlAuditSink {
        JsonlAuditSink::new(self.settings.files.audit_log.clone())
    }
}
