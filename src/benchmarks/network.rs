use colored::Colorize;
use tracing::info;

use crate::waiter::{self, observe, WorkloadObservation};
use crate::workload::{self, VolumePolicy};
use crate::{harvest, selector, BenchmarkRun, RunContext};

#[derive(Debug, Clone)]
pub struct NetworkOptions {
    /// How long the client drives traffic, in seconds.
    pub duration_secs: u64,
    pub cleanup: bool,
}

/// Measures pairwise network throughput between the first two selected nodes.
///
/// A long-running iperf3 server is pinned to the first node; once it has an
/// assigned address a client on the second node connects to it. The server is
/// never polled to a terminal phase: a correctly functioning server runs
/// until deleted, so its lifecycle is bounded by the client's completion.
pub async fn network_test(
    ctx: &RunContext,
    bench: &mut BenchmarkRun,
    opts: &NetworkOptions,
) -> anyhow::Result<()> {
    // checked before any cluster mutation
    selector::require_nodes(&ctx.nodes, 2)?;

    let server_node = &ctx.nodes[0];
    let client_node = &ctx.nodes[1];

    let server_name = workload::role_workload_name("iperf-server");
    let server_command = vec!["iperf3".to_string(), "-s".to_string()];
    let server = workload::build(
        &server_name,
        Some(server_node),
        workload::IPERF_IMAGE,
        &server_command,
        &VolumePolicy::None,
    );
    ctx.gateway.create_workload(&ctx.namespace, &server.pod).await?;
    bench.record_workload(&server_name);
    println!(
        "> server workload {} created on node {}",
        server_name.green(),
        server_node
    );

    let address = await_address(ctx, &server_name).await?;
    info!(address = address.as_str(), "server address assigned");

    let client_name = workload::role_workload_name("iperf-client");
    let client_command = vec![
        "iperf3".to_string(),
        "-c".to_string(),
        address,
        "-t".to_string(),
        opts.duration_secs.to_string(),
    ];
    let client = workload::build(
        &client_name,
        Some(client_node),
        workload::IPERF_IMAGE,
        &client_command,
        &VolumePolicy::None,
    );
    ctx.gateway.create_workload(&ctx.namespace, &client.pod).await?;
    bench.record_workload(&client_name);
    println!(
        "> client workload {} created on node {}, running for {}s",
        client_name.green(),
        client_node,
        opts.duration_secs
    );

    waiter::await_terminal(
        ctx.gateway.clone(),
        &ctx.namespace,
        std::slice::from_ref(&client_name),
        ctx.poll_interval,
        &ctx.cancel,
        WorkloadObservation::is_terminal,
    )
    .await?;

    // client first, then server; only completeness matters
    for name in [&client_name, &server_name] {
        let path = harvest::collect(
            ctx.gateway.as_ref(),
            &ctx.namespace,
            name,
            &ctx.output_dir,
            opts.cleanup,
        )
        .await?;
        println!("> harvested {}", path.display());
    }

    Ok(())
}

/// Polls the server workload until the cluster has assigned it an address.
async fn await_address(ctx: &RunContext, name: &str) -> anyhow::Result<String> {
    let gateway = ctx.gateway.clone();
    let namespace = ctx.namespace.clone();
    let name = name.to_string();

    waiter::poll_until(ctx.poll_interval, &ctx.cancel, move || {
        let gateway = gateway.clone();
        let namespace = namespace.clone();
        let name = name.clone();

        async move {
            let address = gateway
                .get_workload(&namespace, &name)
                .await?
                .as_ref()
                .map(observe)
                .and_then(|obs| obs.assigned_address);

            if address.is_none() {
                println!("Waiting for server workload to be assigned an address...");
            }
            Ok(address)
        }
    })
    .await
}
