//! Configuration safeguard: sanitize, backup, write, verify, roll back.
//!
//! Every failure path leaves the live config untouched or restored from the
//! single backup slot.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::application::ports::RemoteExecutor;
use crate::application::services::gateway::Gateway;
use crate::domain::error::SafeguardError;
use crate::domain::gateway_config::{Sanitized, render_checked, sanitize};

/// Longest base64 run sent in one remote command; keeps every argument well
/// under the kernel's per-argument limit.
pub const TRANSFER_CHUNK_LEN: usize = 48 * 1024;

/// Reads and writes one instance's gateway config through its [`Gateway`].
pub struct ConfigSafeguard<'g, E: RemoteExecutor> {
    gateway: &'g Gateway<'g, E>,
}

impl<'g, E: RemoteExecutor> ConfigSafeguard<'g, E> {
    pub fn new(gateway: &'g Gateway<'g, E>) -> Self {
        Self { gateway }
    }

    fn config_path(&self) -> &str {
        &self.gateway.settings().config_path
    }

    fn instance_id(&self) -> &str {
        &self.gateway.instance().id
    }

    /// Read and parse the live config.
    ///
    /// # Errors
    ///
    /// Returns `SafeguardError::ReadFailed` if the file cannot be read or parsed.
    pub async fn read(&self) -> Result<Value, SafeguardError> {
        self.read_path(self.config_path()).await
    }

    async fn read_path(&self, path: &str) -> Result<Value, SafeguardError> {
        let output = self
            .gateway
            .run(&format!("cat \"{path}\""))
            .await
            .map_err(|e| SafeguardError::ReadFailed(format!("{e:#}")))?;
        if !output.success() {
            return Err(SafeguardError::ReadFailed(format!(
                "exit code {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        serde_json::from_str(&output.stdout).map_err(|e| SafeguardError::ReadFailed(e.to_string()))
    }

    /// Sanitize and write `doc` as the live config.
    ///
    /// Sequence: sanitize, round-trip check, backup (best-effort), write,
    /// re-read and compare, then signal the gateway to reload (fire-and-forget).
    ///
    /// # Errors
    ///
    /// Returns the first failing step. Nothing is written on
    /// `RoundTrip`/`NotAnObject`; the backup is restored on `WriteFailed`
    /// and `VerifyFailed`.
    pub async fn write(&self, doc: &Value) -> Result<Sanitized, SafeguardError> {
        self.write_with(doc, true).await
    }

    async fn write_with(&self, doc: &Value, take_backup: bool) -> Result<Sanitized, SafeguardError> {
        let sanitized = sanitize(doc);
        for change in &sanitized.changes {
            tracing::warn!(instance = %self.instance_id(), %change, "sanitized gateway config");
        }
        let text = render_checked(&sanitized.document)?;

        if take_backup {
            self.backup().await;
        }

        let exit_code = self.transfer(&text).await;
        if exit_code != 0 {
            self.restore().await;
            return Err(SafeguardError::WriteFailed { exit_code });
        }

        match self.read().await {
            Ok(written) if written == sanitized.document => {}
            Ok(_) => {
                self.restore().await;
                return Err(SafeguardError::VerifyFailed(
                    "content differs from what was written".to_string(),
                ));
            }
            Err(e) => {
                self.restore().await;
                return Err(SafeguardError::VerifyFailed(e.to_string()));
            }
        }

        // Without a running process the new config applies on next start.
        let _ = self.gateway.reload().await;
        tracing::info!(
            instance = %self.instance_id(),
            changes = sanitized.changes.len(),
            "gateway config written"
        );
        Ok(sanitized)
    }

    /// Stage `text` base64-encoded next to the live config in chunks of at
    /// most [`TRANSFER_CHUNK_LEN`] characters, then decode it over the live
    /// file. Returns the exit code of the first failing step, `-1` if a step
    /// could not run.
    async fn transfer(&self, text: &str) -> i32 {
        let path = self.config_path();
        let staging = format!("{path}.b64");
        let encoded = BASE64.encode(text.as_bytes());

        let mut steps = vec![format!(
            "mkdir -p \"$(dirname \"{path}\")\" && : > \"{staging}\""
        )];
        // base64 output is ASCII, so byte chunks are valid str slices.
        steps.extend(encoded.as_bytes().chunks(TRANSFER_CHUNK_LEN).map(|chunk| {
            format!(
                "printf '%s' '{}' >> \"{staging}\"",
                String::from_utf8_lossy(chunk)
            )
        }));
        steps.push(format!(
            "base64 -d \"{staging}\" > \"{path}\" && rm -f \"{staging}\""
        ));

        for step in &steps {
            match self.gateway.run(step).await {
                Ok(output) if output.success() => {}
                Ok(output) => return output.exit_code,
                Err(e) => {
                    tracing::warn!(instance = %self.instance_id(), error = %format!("{e:#}"), "config write did not run");
                    return -1;
                }
            }
        }
        0
    }

    /// Rewrite the live config through [`Self::write`] if it needs sanitizing.
    ///
    /// An unparseable live config is replaced with its backup.
    ///
    /// # Errors
    ///
    /// Returns `SafeguardError::Unreadable` if neither document parses, or
    /// the error from [`Self::write`].
    pub async fn repair(&self) -> Result<Sanitized, SafeguardError> {
        let (doc, from_backup) = match self.read().await {
            Ok(doc) => (doc, false),
            Err(live_err) => {
                tracing::warn!(instance = %self.instance_id(), error = %live_err, "live config unreadable; trying backup");
                let backup = self.gateway.settings().backup_path();
                let doc = self
                    .read_path(&backup)
                    .await
                    .map_err(|_| SafeguardError::Unreadable)?;
                (doc, true)
            }
        };

        let preview = sanitize(&doc);
        if preview.is_unchanged() && !from_backup {
            tracing::info!(instance = %self.instance_id(), "gateway config already clean");
            return Ok(preview);
        }
        // The backup slot is the only good copy when the live file was lost.
        self.write_with(&doc, !from_backup).await
    }

    // ── Backup slot ───────────────────────────────────────────────────────────

    async fn backup(&self) {
        let path = self.config_path();
        let backup = self.gateway.settings().backup_path();
        let command = format!(
            "if [ -f \"{path}\" ]; then cp -p \"{path}\" \"{backup}\"; else rm -f \"{backup}\"; fi"
        );
        match self.gateway.run(&command).await {
            Ok(o) if o.success() => {}
            Ok(o) => {
                tracing::warn!(instance = %self.instance_id(), exit_code = o.exit_code, "config backup failed");
            }
            Err(e) => {
                tracing::warn!(instance = %self.instance_id(), error = %format!("{e:#}"), "config backup failed");
            }
        }
    }

    async fn restore(&self) {
        let path = self.config_path();
        let backup = self.gateway.settings().backup_path();
        let command = format!(
            "if [ -f \"{backup}\" ]; then cp -p \"{backup}\" \"{path}\"; else rm -f \"{path}\"; fi"
        );
        let restored = self
            .gateway
            .run(&command)
            .await
            .is_ok_and(|o| o.success());
        if restored {
            tracing::warn!(instance = %self.instance_id(), "config restored from backup");
        } else {
            tracing::error!(instance = %self.instance_id(), "config restore from backup failed");
        }
    }
}
