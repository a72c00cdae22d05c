//! Sanitize command: run the config sanitizer over a local file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::app::OutputMode;
use crate::domain::gateway_config::{render_checked, sanitize};
use crate::output::{OutputContext, json};

/// Arguments for the sanitize command.
#[derive(Args)]
pub struct SanitizeArgs {
    /// Path to a gateway configuration document (JSON)
    pub file: PathBuf,

    /// Write the sanitized document back to the file
    #[arg(long)]
    pub write: bool,
}

#[derive(Debug, Serialize)]
struct SanitizeView {
    file: String,
    changes: Vec<String>,
    written: bool,
}

/// Entry point for `gateway-supervisor sanitize`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the sanitized
/// document fails its round-trip check, or the write fails.
pub fn run(ctx: &OutputContext, mode: OutputMode, args: &SanitizeArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("cannot parse {}", args.file.display()))?;

    let sanitized = sanitize(&doc);
    let text = render_checked(&sanitized.document)?;
    let written = args.write && !sanitized.is_unchanged();
    if written {
        write_atomic(&args.file, &text)?;
    }

    let view = SanitizeView {
        file: args.file.display().to_string(),
        changes: sanitized.changes.iter().map(ToString::to_string).collect(),
        written,
    };

    if mode == OutputMode::Json {
        return json::print(&view);
    }
    if view.changes.is_empty() {
        ctx.ok("already clean");
        return Ok(());
    }
    ctx.changes("change", &view.changes);
    if written {
        ctx.ok(format_args!("wrote {}", view.file));
    } else if !args.write {
        ctx.note("dry run; pass --write to apply");
    }
    Ok(())
}

fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, text)
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;
    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(&temp_path, meta.permissions())
            .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
    }
    std::fs::rename(&temp_path, path)
        .with_context(|| format!("replacing {}", path.display()))
}
