//! JSON-lines implementation of the `AuditSink` port.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use supervisor_common::AuditRecord;

use crate::application::ports::AuditSink;

/// Appends one JSON object per line and mirrors each record to `tracing`.
/// Write failures are logged, never returned.
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn append(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("serializing audit record")?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log lock poisoned"))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening audit log {}", self.path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("appending to {}", self.path.display()))
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) {
        tracing::info!(
            instance = %record.instance_id,
            action = ?record.action,
            reason = record.reason.code(),
            success = record.success,
            "audit"
        );
        if let Err(e) = self.append(record) {
            tracing::error!(error = %format!("{e:#}"), "audit record not persisted");
        }
    }
}
