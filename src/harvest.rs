use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::BenchError;
use crate::gateway::ClusterGateway;

/// Collects a finished workload's log into `<name>.log` under `output_dir`.
///
/// The log is fetched and written before any deletion is attempted, because
/// deleting a workload can also discard its retrievable logs. With
/// `delete_after` the workload and its companion claim (same name, if any)
/// are removed afterwards; both deletes treat not-found as already cleaned.
pub async fn collect(
    gateway: &dyn ClusterGateway,
    namespace: &str,
    name: &str,
    output_dir: &Path,
    delete_after: bool,
) -> anyhow::Result<PathBuf> {
    let log = gateway.fetch_log(namespace, name).await?;

    let path = output_dir.join(format!("{name}.log"));
    fs::write(&path, &log)
        .map_err(|e| BenchError::Harvest(format!("writing {}: {e}", path.display())))?;
    info!(workload = name, path = %path.display(), "harvested log");

    if delete_after {
        gateway.delete_workload(namespace, name).await?;
        gateway.delete_claim(namespace, name).await?;
    }

    Ok(path)
}
