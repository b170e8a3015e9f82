use std::collections::BTreeMap;
use std::fs;

use clap::ValueEnum;
use colored::Colorize;
use k8s_openapi::api::apps::v1::{ReplicaSet, ReplicaSetSpec};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use tracing::info;

use crate::errors::BenchError;
use crate::waiter::{self, observe, Phase};
use crate::workload::{self, VolumePolicy};
use crate::{selector, BenchmarkRun, RunContext};

/// File receiving the ordered readiness latencies, in seconds.
pub const STARTUP_TIMES_FILE: &str = "pod-startup-times.json";

/// How the control plane is saturated. Both strategies avoid node pinning on
/// purpose so the measurement reflects the cluster's own scheduling
/// throughput, not this tool's placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SaturationStrategy {
    /// One replica group fanned out by the cluster; readiness latency is
    /// measured per workload.
    #[default]
    ReplicaGroup,
    /// A burst of individually submitted workloads; the scheduling event
    /// count serves as a coarser control-plane-load indicator.
    DirectBurst,
}

#[derive(Debug, Clone)]
pub struct SaturationOptions {
    pub replicas: i32,
    pub strategy: SaturationStrategy,
    pub cleanup: bool,
}

pub async fn saturate(
    ctx: &RunContext,
    bench: &mut BenchmarkRun,
    opts: &SaturationOptions,
) -> anyhow::Result<()> {
    selector::require_nodes(&ctx.nodes, 1)?;

    match opts.strategy {
        SaturationStrategy::ReplicaGroup => replica_group_strategy(ctx, bench, opts).await,
        SaturationStrategy::DirectBurst => direct_burst_strategy(ctx, bench, opts).await,
    }
}

/// Submits one replica group, waits for it to converge, records per-workload
/// readiness latencies, then scales back to zero and deletes the group.
async fn replica_group_strategy(
    ctx: &RunContext,
    bench: &mut BenchmarkRun,
    opts: &SaturationOptions,
) -> anyhow::Result<()> {
    let name = workload::role_workload_name("saturate");
    let group = build_replica_group(&name, opts.replicas);

    ctx.gateway.create_replica_group(&ctx.namespace, &group).await?;
    bench.record_replica_group(&name);
    println!(
        "> created replica group {} with {} replicas",
        name.green(),
        opts.replicas
    );

    await_available(ctx, &name, opts.replicas).await?;

    // latencies come from the workloads the cluster fanned out for us,
    // ordered by name so the artifact is stable
    let mut group_pods: Vec<_> = ctx
        .gateway
        .list_workloads(&ctx.namespace)
        .await?
        .into_iter()
        .filter(|pod| {
            pod.metadata
                .labels
                .as_ref()
                .and_then(|labels| labels.get("app"))
                .is_some_and(|app| app == &name)
        })
        .collect();
    group_pods.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

    let latencies: Vec<f64> = group_pods
        .iter()
        .map(observe)
        .filter_map(|obs| obs.ready_latency)
        .collect();

    let path = ctx.output_dir.join(STARTUP_TIMES_FILE);
    let json = serde_json::to_string(&latencies)?;
    fs::write(&path, json)
        .map_err(|e| BenchError::Harvest(format!("writing {}: {e}", path.display())))?;
    info!(count = latencies.len(), path = %path.display(), "wrote startup latencies");
    println!(
        "> recorded {} startup latencies to {}",
        latencies.len().to_string().green(),
        path.display()
    );

    if opts.cleanup {
        ctx.gateway
            .scale_replica_group(&ctx.namespace, &name, 0)
            .await?;
        await_available(ctx, &name, 0).await?;
        ctx.gateway
            .delete_replica_group(&ctx.namespace, &name)
            .await?;
        println!("> replica group {} scaled down and deleted", name.green());
    }

    Ok(())
}

/// Submits `5 × |NodeSet|` unscheduled minimal workloads and reports the
/// number of scheduling events the cluster's default scheduler emitted.
async fn direct_burst_strategy(
    ctx: &RunContext,
    bench: &mut BenchmarkRun,
    opts: &SaturationOptions,
) -> anyhow::Result<()> {
    let count = 5 * ctx.nodes.len();

    let mut names = Vec::with_capacity(count);
    for index in 0..count {
        let name = workload::indexed_workload_name("burst", index);
        let built = workload::build(&name, None, workload::PAUSE_IMAGE, &[], &VolumePolicy::None);
        ctx.gateway.create_workload(&ctx.namespace, &built.pod).await?;
        bench.record_workload(&name);
        names.push(name);
    }
    println!("> submitted a burst of {} workloads", count.to_string().green());

    // wait for the whole burst to leave Pending, i.e. to have been scheduled
    waiter::await_terminal(
        ctx.gateway.clone(),
        &ctx.namespace,
        &names,
        ctx.poll_interval,
        &ctx.cancel,
        |obs| obs.phase != Phase::Pending,
    )
    .await?;

    let events = ctx.gateway.list_scheduling_events(&ctx.namespace).await?;
    let scheduled = events
        .iter()
        .filter(|event| event.involved_object.kind.as_deref() == Some("Pod"))
        .filter(|event| {
            event
                .source
                .as_ref()
                .and_then(|source| source.component.as_deref())
                == Some("default-scheduler")
        })
        .count();

    println!(
        "> observed {} scheduling events for the burst",
        scheduled.to_string().green()
    );

    if opts.cleanup {
        for name in &names {
            ctx.gateway.delete_workload(&ctx.namespace, name).await?;
        }
        println!("> burst workloads deleted");
    }

    Ok(())
}

/// Polls the replica group until `availableReplicas` converges to `target`.
/// An absent status counts as zero available.
async fn await_available(ctx: &RunContext, name: &str, target: i32) -> anyhow::Result<()> {
    let gateway = ctx.gateway.clone();
    let namespace = ctx.namespace.clone();
    let name = name.to_string();

    waiter::poll_until(ctx.poll_interval, &ctx.cancel, move || {
        let gateway = gateway.clone();
        let namespace = namespace.clone();
        let name = name.clone();

        async move {
            let group = gateway
                .get_replica_group(&namespace, &name)
                .await?
                .ok_or_else(|| BenchError::Gateway(format!("replica group {name} vanished")))?;

            let available = group
                .status
                .as_ref()
                .and_then(|status| status.available_replicas)
                .unwrap_or(0);

            if available == target {
                return Ok(Some(()));
            }

            println!("Waiting for replica group... ({available}/{target} available)");
            Ok(None)
        }
    })
    .await
}

fn build_replica_group(name: &str, replicas: i32) -> ReplicaSet {
    let labels = BTreeMap::from([("app".to_string(), name.to_string())]);

    // the template is the saturation workload without a target node; the
    // cluster is responsible for fan-out
    let template = workload::build(name, None, workload::PAUSE_IMAGE, &[], &VolumePolicy::None);

    ReplicaSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ReplicaSetSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: Some(PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: template.pod.spec,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
