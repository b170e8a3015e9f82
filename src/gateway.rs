use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{Event, Node, PersistentVolumeClaim, Pod};
use kube::api::{Api, DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use tracing::debug;

use crate::errors::BenchError;

/// Capability surface over the cluster control plane.
///
/// Everything the benchmark drivers need from Kubernetes goes through this
/// trait so the orchestration logic can be exercised against an in-memory
/// cluster in tests. All deletes are idempotent: deleting an object that has
/// already vanished is treated as already-cleaned, not as an error.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn list_nodes(&self) -> anyhow::Result<Vec<String>>;

    async fn create_workload(&self, namespace: &str, pod: &Pod) -> anyhow::Result<()>;
    async fn get_workload(&self, namespace: &str, name: &str) -> anyhow::Result<Option<Pod>>;
    async fn list_workloads(&self, namespace: &str) -> anyhow::Result<Vec<Pod>>;
    async fn delete_workload(&self, namespace: &str, name: &str) -> anyhow::Result<()>;

    async fn create_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> anyhow::Result<()>;
    async fn delete_claim(&self, namespace: &str, name: &str) -> anyhow::Result<()>;

    async fn create_replica_group(&self, namespace: &str, group: &ReplicaSet)
        -> anyhow::Result<()>;
    async fn get_replica_group(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<ReplicaSet>>;
    async fn scale_replica_group(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> anyhow::Result<()>;
    async fn delete_replica_group(&self, namespace: &str, name: &str) -> anyhow::Result<()>;

    /// Fetches the complete log output of a workload.
    async fn fetch_log(&self, namespace: &str, name: &str) -> anyhow::Result<String>;

    /// Lists all events in the namespace; callers filter for what they need.
    async fn list_scheduling_events(&self, namespace: &str) -> anyhow::Result<Vec<Event>>;
}

fn gateway_error(action: &str, err: kube::Error) -> anyhow::Error {
    BenchError::Gateway(format!("{action}: {err}")).into()
}

/// Production gateway backed by a kube client.
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    /// Connects using an explicit kubeconfig path when given, otherwise falls
    /// back to the standard inference chain (in-cluster config, `KUBECONFIG`,
    /// `~/.kube/config`).
    pub async fn connect(kubeconfig: Option<&Path>) -> anyhow::Result<KubeGateway> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    BenchError::Config(format!("reading kubeconfig {}: {e}", path.display()))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| BenchError::Config(format!("loading kubeconfig: {e}")))?
            }
            None => Config::infer()
                .await
                .map_err(|e| BenchError::Config(format!("inferring cluster config: {e}")))?,
        };

        let client = Client::try_from(config)
            .map_err(|e| BenchError::Config(format!("building cluster client: {e}")))?;

        Ok(KubeGateway { client })
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn claims(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn replica_sets(&self, namespace: &str) -> Api<ReplicaSet> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_nodes(&self) -> anyhow::Result<Vec<String>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(|e| gateway_error("listing nodes", e))?;

        Ok(nodes
            .items
            .into_iter()
            .filter_map(|node| node.metadata.name)
            .collect())
    }

    async fn create_workload(&self, namespace: &str, pod: &Pod) -> anyhow::Result<()> {
        debug!(name = pod.metadata.name.as_deref(), "creating workload");
        self.pods(namespace)
            .create(&PostParams::default(), pod)
            .await
            .map_err(|e| gateway_error("creating workload", e))?;
        Ok(())
    }

    async fn get_workload(&self, namespace: &str, name: &str) -> anyhow::Result<Option<Pod>> {
        self.pods(namespace)
            .get_opt(name)
            .await
            .map_err(|e| gateway_error("fetching workload", e))
    }

    async fn list_workloads(&self, namespace: &str) -> anyhow::Result<Vec<Pod>> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| gateway_error("listing workloads", e))?;
        Ok(pods.items)
    }

    async fn delete_workload(&self, namespace: &str, name: &str) -> anyhow::Result<()> {
        match self
            .pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
            Err(e) => Err(gateway_error("deleting workload", e)),
        }
    }

    async fn create_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> anyhow::Result<()> {
        debug!(name = claim.metadata.name.as_deref(), "creating claim");
        self.claims(namespace)
            .create(&PostParams::default(), claim)
            .await
            .map_err(|e| gateway_error("creating claim", e))?;
        Ok(())
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> anyhow::Result<()> {
        match self
            .claims(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
            Err(e) => Err(gateway_error("deleting claim", e)),
        }
    }

    async fn create_replica_group(
        &self,
        namespace: &str,
        group: &ReplicaSet,
    ) -> anyhow::Result<()> {
        debug!(name = group.metadata.name.as_deref(), "creating replica group");
        self.replica_sets(namespace)
            .create(&PostParams::default(), group)
            .await
            .map_err(|e| gateway_error("creating replica group", e))?;
        Ok(())
    }

    async fn get_replica_group(
        &self,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<ReplicaSet>> {
        self.replica_sets(namespace)
            .get_opt(name)
            .await
            .map_err(|e| gateway_error("fetching replica group", e))
    }

    async fn scale_replica_group(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> anyhow::Result<()> {
        let patch = json!({ "spec": { "replicas": replicas } });
        self.replica_sets(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| gateway_error("scaling replica group", e))?;
        Ok(())
    }

    async fn delete_replica_group(&self, namespace: &str, name: &str) -> anyhow::Result<()> {
        match self
            .replica_sets(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
            Err(e) => Err(gateway_error("deleting replica group", e)),
        }
    }

    async fn fetch_log(&self, namespace: &str, name: &str) -> anyhow::Result<String> {
        self.pods(namespace)
            .logs(name, &LogParams::default())
            .await
            .map_err(|e| gateway_error("streaming workload log", e))
    }

    async fn list_scheduling_events(&self, namespace: &str) -> anyhow::Result<Vec<Event>> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let events = api
            .list(&ListParams::default())
            .await
            .map_err(|e| gateway_error("listing events", e))?;
        Ok(events.items)
    }
}
