use colored::Colorize;
use term_table::{row, row::Row, rows, table_cell::*, Table, TableStyle};
use tracing::{info, warn};

use crate::errors::BenchError;
use crate::waiter::{self, WorkloadObservation};
use crate::workload::{self, VolumePolicy};
use crate::{harvest, selector, BenchmarkRun, RunContext};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Command the workload on every node executes. A single element is
    /// split into POSIX words; multiple elements are taken as-is.
    pub command: Vec<String>,
    pub image: String,
    pub volume: VolumePolicy,
    pub cleanup: bool,
}

/// Runs one workload per selected node and harvests every log.
///
/// Per run: submit everything, wait for all workloads to go terminal,
/// harvest, then clean up claims. A create failure is fatal to the run; a
/// partially-submitted run has no compensating recovery beyond the caller's
/// best-effort cleanup.
pub async fn run(
    ctx: &RunContext,
    bench: &mut BenchmarkRun,
    opts: &RunOptions,
) -> anyhow::Result<()> {
    selector::require_nodes(&ctx.nodes, 1)?;
    let command = workload::tokenize_command(&opts.command)?;

    // submitting: claim before workload, one pair per node
    let mut names = Vec::with_capacity(ctx.nodes.len());
    for node in &ctx.nodes {
        let name = workload::node_workload_name(node);
        let built = workload::build(&name, Some(node), &opts.image, &command, &opts.volume);

        if let Some(claim) = &built.claim {
            ctx.gateway.create_claim(&ctx.namespace, claim).await?;
            bench.record_claim(&name);
        }

        ctx.gateway.create_workload(&ctx.namespace, &built.pod).await?;
        bench.record_workload(&name);
        names.push(name);
    }

    println!(
        "> created {} workloads across {} nodes",
        names.len().to_string().green(),
        ctx.nodes.len()
    );

    // waiting: Succeeded and Failed are both terminal here
    let observations = waiter::await_terminal(
        ctx.gateway.clone(),
        &ctx.namespace,
        &names,
        ctx.poll_interval,
        &ctx.cancel,
        WorkloadObservation::is_terminal,
    )
    .await?;

    // harvesting: a single bad workload must not cost us the other logs
    let mut harvest_failures = 0usize;
    for name in &names {
        match harvest::collect(
            ctx.gateway.as_ref(),
            &ctx.namespace,
            name,
            &ctx.output_dir,
            opts.cleanup,
        )
        .await
        {
            Ok(path) => info!(workload = name.as_str(), path = %path.display(), "harvested"),
            Err(e) => {
                warn!(workload = name.as_str(), "harvest failed: {e}");
                harvest_failures += 1;
            }
        }
    }

    // cleaning up: sweep every companion claim, not-found is fine
    if opts.cleanup {
        for claim in bench.claims().to_vec() {
            ctx.gateway.delete_claim(&ctx.namespace, &claim).await?;
        }
    }

    print_summary(ctx, &names, &observations);

    if harvest_failures > 0 {
        return Err(BenchError::Harvest(format!(
            "{harvest_failures} of {} workload logs could not be harvested",
            names.len()
        ))
        .into());
    }

    Ok(())
}

fn print_summary(
    ctx: &RunContext,
    names: &[String],
    observations: &std::collections::HashMap<String, WorkloadObservation>,
) {
    println!("\n{}", " Summary ".reversed().green());

    let mut table_rows = rows![row![
        TableCell::builder("Node".bold()).build(),
        TableCell::builder("Workload".bold()).build(),
        TableCell::builder("Phase".bold()).build()
    ]];

    for (node, name) in ctx.nodes.iter().zip(names) {
        let phase = observations
            .get(name)
            .map(|obs| format!("{:?}", obs.phase))
            .unwrap_or_else(|| "--".to_string());

        table_rows.push(row![
            TableCell::new(node),
            TableCell::new(name),
            TableCell::new(phase)
        ]);
    }

    let table = Table::builder()
        .rows(table_rows)
        .style(TableStyle::rounded())
        .build();

    println!("{}", table.render());
}
