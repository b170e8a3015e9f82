pub mod benchmarks;
pub mod clap_args;
pub mod errors;
pub mod gateway;
pub mod harvest;
pub mod selector;
pub mod waiter;
pub mod workload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use benchmarks::{distributed, network, saturation};
use gateway::ClusterGateway;

/// Default interval between polls of the cluster state.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Everything a benchmark driver needs, constructed once per invocation and
/// passed by parameter rather than held in globals.
pub struct RunContext {
    pub gateway: Arc<dyn ClusterGateway>,
    pub namespace: String,
    /// Nodes selected for this run, in inventory order.
    pub nodes: Vec<String>,
    /// Directory that receives log and latency artifacts.
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("namespace", &self.namespace)
            .field("nodes", &self.nodes)
            .field("output_dir", &self.output_dir)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    /// Fetches the node inventory, prints it along with the number of
    /// workloads already present in the namespace, and applies the node
    /// allow-list. Fails before any mutation if the selection is empty.
    pub async fn prepare(
        gateway: Arc<dyn ClusterGateway>,
        namespace: &str,
        allow_list: Option<&str>,
        output_dir: PathBuf,
        cancel: CancellationToken,
    ) -> anyhow::Result<RunContext> {
        let inventory = gateway.list_nodes().await?;

        println!("Nodes:");
        for node in &inventory {
            println!("{node}");
        }
        println!();

        let existing = gateway.list_workloads(namespace).await?;
        println!("There are {} workloads in the namespace", existing.len());

        let nodes = selector::select_nodes(&inventory, allow_list);
        selector::require_nodes(&nodes, 1)?;
        println!("Selected nodes: {}", nodes.iter().join(", "));

        Ok(RunContext {
            gateway,
            namespace: namespace.to_string(),
            nodes,
            output_dir,
            poll_interval: POLL_INTERVAL,
            cancel,
        })
    }
}

/// Which benchmark to drive. One invocation runs exactly one mode; requesting
/// several means sequential invocations so measurements don't skew each other.
pub enum BenchmarkMode {
    DistributedCommand(distributed::RunOptions),
    Saturation(saturation::SaturationOptions),
    NetworkTest(network::NetworkOptions),
}

/// Ledger of every resource a run has created, so that interruption or
/// failure part-way through still ends in best-effort cleanup instead of
/// orphaned workloads and claims.
#[derive(Debug, Default)]
pub struct BenchmarkRun {
    workloads: Vec<String>,
    claims: Vec<String>,
    replica_groups: Vec<String>,
}

impl BenchmarkRun {
    pub fn new() -> BenchmarkRun {
        BenchmarkRun::default()
    }

    pub fn record_workload(&mut self, name: &str) {
        self.workloads.push(name.to_string());
    }

    pub fn record_claim(&mut self, name: &str) {
        self.claims.push(name.to_string());
    }

    pub fn record_replica_group(&mut self, name: &str) {
        self.replica_groups.push(name.to_string());
    }

    pub fn claims(&self) -> &[String] {
        &self.claims
    }

    /// Deletes everything the run created, replica groups first so the
    /// cluster stops replacing their workloads. Failures are logged and
    /// skipped; not-found is already treated as success by the gateway.
    pub async fn abort_cleanup(&self, gateway: &dyn ClusterGateway, namespace: &str) {
        for name in &self.replica_groups {
            if let Err(e) = gateway.delete_replica_group(namespace, name).await {
                warn!(group = name.as_str(), "cleanup failed: {e}");
            }
        }
        for name in &self.workloads {
            if let Err(e) = gateway.delete_workload(namespace, name).await {
                warn!(workload = name.as_str(), "cleanup failed: {e}");
            }
        }
        for name in &self.claims {
            if let Err(e) = gateway.delete_claim(namespace, name).await {
                warn!(claim = name.as_str(), "cleanup failed: {e}");
            }
        }
    }
}

/// Runs one benchmark to completion. On failure or cancellation everything
/// the run managed to create is cleaned up best-effort before the error is
/// handed back to the caller.
pub async fn execute(ctx: &RunContext, mode: BenchmarkMode) -> anyhow::Result<()> {
    let mut run = BenchmarkRun::new();

    let result = match &mode {
        BenchmarkMode::DistributedCommand(opts) => distributed::run(ctx, &mut run, opts).await,
        BenchmarkMode::Saturation(opts) => saturation::saturate(ctx, &mut run, opts).await,
        BenchmarkMode::NetworkTest(opts) => network::network_test(ctx, &mut run, opts).await,
    };

    if result.is_err() {
        run.abort_cleanup(ctx.gateway.as_ref(), &ctx.namespace).await;
    }

    result
}
