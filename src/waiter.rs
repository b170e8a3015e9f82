use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::BenchError;
use crate::gateway::ClusterGateway;

/// Lifecycle phase of a workload as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl Phase {
    fn parse(phase: Option<&str>) -> Phase {
        match phase {
            Some("Pending") => Phase::Pending,
            Some("Running") => Phase::Running,
            Some("Succeeded") => Phase::Succeeded,
            Some("Failed") => Phase::Failed,
            _ => Phase::Unknown,
        }
    }
}

/// A single poll's view of one workload. Never cached across cycles; every
/// poll re-fetches the full state from the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadObservation {
    pub name: String,
    pub phase: Phase,
    /// Populated once the workload has been scheduled and assigned an address.
    pub assigned_address: Option<String>,
    /// Seconds from creation to the workload's `Ready` condition.
    pub ready_latency: Option<f64>,
}

impl WorkloadObservation {
    /// Default terminal predicate: the workload is no longer making progress.
    /// Succeeded and Failed are both terminal; a non-zero exit is only
    /// surfaced through the phase and the harvested log.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.phase, Phase::Pending | Phase::Running)
    }
}

/// Builds an observation from a fetched pod.
pub fn observe(pod: &Pod) -> WorkloadObservation {
    let status = pod.status.as_ref();

    let assigned_address = status
        .and_then(|s| s.pod_ip.clone())
        .filter(|ip| !ip.is_empty());

    let ready_latency = status
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.type_ == "Ready" && c.status == "True")
        })
        .and_then(|ready| ready.last_transition_time.as_ref())
        .zip(pod.metadata.creation_timestamp.as_ref())
        .map(|(ready, created)| {
            let millis = (ready.0 - created.0).num_milliseconds();
            (millis as f64 / 1000.0).max(0.0)
        });

    WorkloadObservation {
        name: pod.metadata.name.clone().unwrap_or_default(),
        phase: Phase::parse(status.and_then(|s| s.phase.as_deref())),
        assigned_address,
        ready_latency,
    }
}

/// Cooperative polling primitive shared by every wait site.
///
/// Calls `probe` immediately and then once per `interval` until it yields a
/// value. Probe failures abort the wait. Cancellation wins over the sleep and
/// surfaces as [`BenchError::Cancelled`] so the caller can fall through to
/// best-effort cleanup.
pub async fn poll_until<T, F, Fut>(
    interval: Duration,
    cancel: &CancellationToken,
    mut probe: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<T>>>,
{
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(BenchError::Cancelled.into()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Blocks until every named workload satisfies `is_done`, re-listing the
/// whole namespace each cycle. Returns the final observation per name.
///
/// Prints a single progress line per cycle rather than per-workload detail so
/// large node counts don't flood the output. A workload that has not appeared
/// in a listing yet simply keeps the wait going.
pub async fn await_terminal<F>(
    gateway: Arc<dyn ClusterGateway>,
    namespace: &str,
    names: &[String],
    interval: Duration,
    cancel: &CancellationToken,
    is_done: F,
) -> anyhow::Result<HashMap<String, WorkloadObservation>>
where
    F: Fn(&WorkloadObservation) -> bool + Send + Sync + 'static,
{
    let namespace = namespace.to_string();
    let wanted: Vec<String> = names.to_vec();
    let is_done = Arc::new(is_done);

    poll_until(interval, cancel, move || {
        let gateway = gateway.clone();
        let namespace = namespace.clone();
        let wanted = wanted.clone();
        let is_done = is_done.clone();

        async move {
            let pods = gateway.list_workloads(&namespace).await?;

            let observations: HashMap<String, WorkloadObservation> = pods
                .iter()
                .map(observe)
                .filter(|obs| wanted.contains(&obs.name))
                .map(|obs| (obs.name.clone(), obs))
                .collect();

            let done = wanted
                .iter()
                .filter(|name| observations.get(*name).map(|o| (*is_done)(o)).unwrap_or(false))
                .count();

            if done == wanted.len() {
                return Ok(Some(observations));
            }

            debug!(done, total = wanted.len(), "workloads not yet terminal");
            println!(
                "Waiting for workloads to complete... ({}/{} done)",
                done,
                wanted.len()
            );
            Ok(None)
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn pod_in_phase(name: &str, phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn succeeded_and_failed_are_terminal() {
        for phase in ["Succeeded", "Failed", "Unknown"] {
            assert!(observe(&pod_in_phase("w", phase)).is_terminal());
        }
        for phase in ["Pending", "Running"] {
            assert!(!observe(&pod_in_phase("w", phase)).is_terminal());
        }
    }

    #[test]
    fn unreported_phase_maps_to_unknown() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("w".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(observe(&pod).phase, Phase::Unknown);
    }

    #[test]
    fn empty_address_counts_as_unassigned() {
        let mut pod = pod_in_phase("w", "Pending");
        pod.status.as_mut().unwrap().pod_ip = Some(String::new());
        assert!(observe(&pod).assigned_address.is_none());

        pod.status.as_mut().unwrap().pod_ip = Some("10.0.0.7".to_string());
        assert_eq!(observe(&pod).assigned_address.as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn ready_latency_is_measured_from_creation_and_never_negative() {
        let created = chrono::Utc::now();
        let mut pod = pod_in_phase("w", "Running");
        pod.metadata.creation_timestamp = Some(Time(created));
        pod.status.as_mut().unwrap().conditions = Some(vec![PodCondition {
            type_: "Ready".to_string(),
            status: "True".to_string(),
            last_transition_time: Some(Time(created + chrono::Duration::milliseconds(2500))),
            ..Default::default()
        }]);

        let latency = observe(&pod).ready_latency.unwrap();
        assert!((latency - 2.5).abs() < 1e-9);

        // a clock-skewed ready condition clamps to zero
        pod.status.as_mut().unwrap().conditions = Some(vec![PodCondition {
            type_: "Ready".to_string(),
            status: "True".to_string(),
            last_transition_time: Some(Time(created - chrono::Duration::seconds(1))),
            ..Default::default()
        }]);
        assert_eq!(observe(&pod).ready_latency, Some(0.0));
    }

    #[test]
    fn latency_requires_a_true_ready_condition() {
        let mut pod = pod_in_phase("w", "Pending");
        pod.metadata.creation_timestamp = Some(Time(chrono::Utc::now()));
        pod.status.as_mut().unwrap().conditions = Some(vec![PodCondition {
            type_: "Ready".to_string(),
            status: "False".to_string(),
            last_transition_time: Some(Time(chrono::Utc::now())),
            ..Default::default()
        }]);
        assert!(observe(&pod).ready_latency.is_none());
    }

    #[tokio::test]
    async fn poll_until_returns_the_first_yielded_value() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let calls_ref = &mut calls;

        let value = poll_until(Duration::from_millis(1), &cancel, move || {
            *calls_ref += 1;
            let attempt = *calls_ref;
            async move {
                if attempt < 3 {
                    Ok(None)
                } else {
                    Ok(Some(attempt))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn poll_until_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: anyhow::Result<()> =
            poll_until(Duration::from_secs(60), &cancel, || async { Ok(None) }).await;

        let err = result.unwrap_err();
        assert!(err.downcast_ref::<BenchError>().is_some());
    }

    #[tokio::test]
    async fn poll_until_surfaces_probe_failures() {
        let cancel = CancellationToken::new();
        let result: anyhow::Result<()> = poll_until(Duration::from_millis(1), &cancel, || async {
            Err(anyhow::anyhow!("listing failed"))
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("listing failed"));
    }
}
