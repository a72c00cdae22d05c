//! Command implementations

pub mod check;
pub mod repair;
pub mod run;
pub mod sanitize;
pub mod status;

use anyhow::Result;
use supervisor_common::Instance;

use crate::infra::registry::FileInstanceRegistry;

/// Look up an instance by id in the registry file, active or not.
///
/// # Errors
///
/// Returns an error if the registry cannot be read or has no such instance.
pub async fn find_instance(registry: &FileInstanceRegistry, id: &str) -> Result<Instance> {
    registry
        .load_instances()
        .await?
        .into_iter()
        .find(|i| i.id == id)
        .ok_or_else(|| anyhow::anyhow!("unknown instance '{id}'"))
}
