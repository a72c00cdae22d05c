//! YAML settings store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::settings::Settings;

/// Directory under the platform config dir holding `config.yaml`.
pub const APP_DIR: &str = "gateway-supervisor";

/// Loads supervisor settings from a YAML file on disk.
pub struct YamlSettingsStore {
    path: PathBuf,
}

impl YamlSettingsStore {
    /// Use `explicit` (from `--config` or `GATEWAY_SUPERVISOR_CONFIG`) if
    /// given, else `<config dir>/gateway-supervisor/config.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if no path was given and the platform config
    /// directory cannot be determined.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::with_path(path));
        }
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config directory"))?;
        Ok(Self::with_path(base.join(APP_DIR).join("config.yaml")))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load, validate, and anchor relative file paths at the settings file's
    /// directory. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn load(&self) -> Result<Settings> {
        let settings = if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("cannot read {}", self.path.display()))?;
            if content.trim().is_empty() {
                Settings::default()
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("cannot parse {}", self.path.display()))?
            }
        } else {
            tracing::debug!(path = %self.path.display(), "no settings file; using defaults");
            Settings::default()
        };
        settings
            .validate()
            .with_context(|| format!("invalid settings in {}", self.path.display()))?;

        let base = self
            .path
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);
        Ok(Settings {
            files: settings.files.resolved_against(&base),
            ..settings
        })
    }
}
