//! File-backed implementation of the `InstanceRegistry` port.
//!
//! Instances come from a YAML list re-read on every sweep; statuses go to a
//! JSON map keyed by instance id, written atomically (temp file + rename).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use supervisor_common::{Instance, InstanceStatus, StatusEntry};
use tokio::sync::Mutex;

use crate::application::ports::InstanceRegistry;

/// Status file contents: instance id → last recorded status.
pub type StatusMap = BTreeMap<String, StatusEntry>;

pub struct FileInstanceRegistry {
    instances_path: PathBuf,
    status_path: PathBuf,
    // Serialises read-modify-write of the status file across concurrent ticks.
    status_lock: Mutex<()>,
}

impl FileInstanceRegistry {
    #[must_use]
    pub fn new(instances_path: PathBuf, status_path: PathBuf) -> Self {
        Self {
            instances_path,
            status_path,
            status_lock: Mutex::new(()),
        }
    }

    /// Every instance in the registry file, active or not. A missing file is
    /// an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_instances(&self) -> Result<Vec<Instance>> {
        let path = self.instances_path.clone();
        tokio::task::spawn_blocking(move || load_instance_list(&path))
            .await
            .context("instances load task panicked")?
    }

    /// Last persisted statuses.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_statuses(&self) -> Result<StatusMap> {
        let path = self.status_path.clone();
        tokio::task::spawn_blocking(move || load_status_map(&path))
            .await
            .context("status load task panicked")?
    }
}

fn load_instance_list(path: &Path) -> Result<Vec<Instance>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading instances file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(&content)
        .with_context(|| format!("parsing instances file {}", path.display()))
}

fn load_status_map(path: &Path) -> Result<StatusMap> {
    if !path.exists() {
        return Ok(StatusMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading status file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing status file {}", path.display()))
}

fn save_status_map(path: &Path, map: &StatusMap) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(map).context("serializing status map")?;

    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, &content)
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
    }

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("finalizing status file {}", path.display()))
}

impl InstanceRegistry for FileInstanceRegistry {
    async fn active_instances(&self) -> Result<Vec<Instance>> {
        Ok(self
            .load_instances()
            .await?
            .into_iter()
            .filter(|i| i.active)
            .collect())
    }

    async fn record_status(&self, instance_id: &str, status: InstanceStatus) -> Result<()> {
        let _guard = self.status_lock.lock().await;
        let path = self.status_path.clone();
        let id = instance_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut map = load_status_map(&path)?;
            map.insert(
                id,
                StatusEntry {
                    status,
                    updated_at: Utc::now(),
                },
            );
            save_status_map(&path, &map)
        })
        .await
        .context("status save task panicked")?
    }
}
