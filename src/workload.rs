use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, Pod, PodSecurityContext, PodSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Prefix for every object this tool creates. Workload names are a pure
/// function of (role, node-or-index) so that polling and cleanup by name are
/// unambiguous across a run.
pub const NAME_PREFIX: &str = "kubeperf";

/// Image used by the distributed command runner, kept from the original tool.
pub const DEFAULT_IMAGE: &str = "nginx:1.12";

/// Minimal image for saturation workloads; does nothing but start quickly.
pub const PAUSE_IMAGE: &str = "registry.k8s.io/pause:3.9";

/// Image providing the iperf3 server and client for the network test.
pub const IPERF_IMAGE: &str = "networkstatic/iperf3";

/// Path at which claim-backed and scratch volumes are mounted.
const VOLUME_MOUNT_PATH: &str = "/data";

/// File-system group applied whenever a claim is mounted, so the workload can
/// write to the provisioned volume without running as root.
const VOLUME_FS_GROUP: i64 = 1000;

/// How a workload's storage is satisfied.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum VolumePolicy {
    /// No volume at all.
    #[default]
    None,
    /// A claim-backed volume; one companion claim per workload, created
    /// before the workload and named after it.
    PersistentClaim { storage_class: Option<String> },
    /// A node-local scratch volume, satisfied by the node itself.
    EphemeralScratch,
}

/// A workload ready for submission plus its companion claim, if the volume
/// policy calls for one. The claim must be created before the pod.
#[derive(Debug, Clone)]
pub struct Workload {
    pub pod: Pod,
    pub claim: Option<PersistentVolumeClaim>,
}

pub fn node_workload_name(node: &str) -> String {
    format!("{}-{}", NAME_PREFIX, node)
}

pub fn indexed_workload_name(role: &str, index: usize) -> String {
    format!("{}-{}-{}", NAME_PREFIX, role, index)
}

pub fn role_workload_name(role: &str) -> String {
    format!("{}-{}", NAME_PREFIX, role)
}

/// Normalises a caller-supplied command into an argument list.
///
/// A single element is treated as a whole command line and split into POSIX
/// words; anything else is assumed to be pre-tokenized by the caller, which
/// is the only way to pass arguments with embedded spaces.
pub fn tokenize_command(parts: &[String]) -> anyhow::Result<Vec<String>> {
    match parts {
        [single] => shlex::split(single)
            .ok_or_else(|| anyhow::anyhow!("command is not a valid POSIX command line: {single}")),
        _ => Ok(parts.to_vec()),
    }
}

/// Builds a complete workload specification for submission.
///
/// Pure construction, no side effects. `node` pins the pod to a node; `None`
/// lets the cluster place it. Restart policy is always `Never` because every
/// benchmark workload is single-shot.
pub fn build(
    name: &str,
    node: Option<&str>,
    image: &str,
    command: &[String],
    volume: &VolumePolicy,
) -> Workload {
    let mut claim = None;
    let mut volumes = None;
    let mut volume_mounts = None;
    let mut security_context = None;

    match volume {
        VolumePolicy::None => {}
        VolumePolicy::PersistentClaim { storage_class } => {
            claim = Some(build_claim(name, storage_class.as_deref()));
            volumes = Some(vec![Volume {
                name: "data".to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: name.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }]);
            volume_mounts = Some(vec![VolumeMount {
                name: "data".to_string(),
                mount_path: VOLUME_MOUNT_PATH.to_string(),
                ..Default::default()
            }]);
            security_context = Some(PodSecurityContext {
                fs_group: Some(VOLUME_FS_GROUP),
                ..Default::default()
            });
        }
        VolumePolicy::EphemeralScratch => {
            volumes = Some(vec![Volume {
                name: "data".to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            }]);
            volume_mounts = Some(vec![VolumeMount {
                name: "data".to_string(),
                mount_path: VOLUME_MOUNT_PATH.to_string(),
                ..Default::default()
            }]);
        }
    }

    let pod = Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: node.map(|n| n.to_string()),
            restart_policy: Some("Never".to_string()),
            security_context,
            volumes,
            containers: vec![Container {
                name: NAME_PREFIX.to_string(),
                image: Some(image.to_string()),
                // an empty command defers to the image entrypoint
                command: (!command.is_empty()).then(|| command.to_vec()),
                volume_mounts,
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    };

    Workload { pod, claim }
}

fn build_claim(name: &str, storage_class: Option<&str>) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: storage_class.map(|sc| sc.to_string()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity("1Gi".to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Vec<String> {
        vec!["echo".to_string(), "1".to_string()]
    }

    #[test]
    fn names_are_deterministic() {
        assert_eq!(node_workload_name("n1"), "kubeperf-n1");
        assert_eq!(node_workload_name("n1"), node_workload_name("n1"));
        assert_eq!(indexed_workload_name("burst", 3), "kubeperf-burst-3");
        assert_eq!(role_workload_name("iperf-server"), "kubeperf-iperf-server");
    }

    #[test]
    fn single_string_commands_are_split_into_posix_words() {
        let tokens = tokenize_command(&["echo 'hello world'".to_string()]).unwrap();
        assert_eq!(tokens, vec!["echo".to_string(), "hello world".to_string()]);
    }

    #[test]
    fn pre_tokenized_commands_pass_through_unchanged() {
        let parts = vec!["echo".to_string(), "hello world".to_string()];
        assert_eq!(tokenize_command(&parts).unwrap(), parts);
    }

    #[test]
    fn pinned_workload_targets_the_node() {
        let workload = build("kubeperf-n1", Some("n1"), DEFAULT_IMAGE, &echo(), &VolumePolicy::None);
        let spec = workload.pod.spec.unwrap();
        assert_eq!(spec.node_name.as_deref(), Some("n1"));
        assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
        assert!(workload.claim.is_none());
        assert!(spec.volumes.is_none());
    }

    #[test]
    fn unpinned_workload_leaves_placement_to_the_cluster() {
        let workload = build("kubeperf-burst-0", None, PAUSE_IMAGE, &[], &VolumePolicy::None);
        assert!(workload.pod.spec.unwrap().node_name.is_none());
    }

    #[test]
    fn claim_policy_yields_a_companion_claim() {
        let workload = build(
            "kubeperf-n1",
            Some("n1"),
            DEFAULT_IMAGE,
            &echo(),
            &VolumePolicy::PersistentClaim {
                storage_class: Some("fast".to_string()),
            },
        );

        let claim = workload.claim.expect("claim policy must yield a claim");
        assert_eq!(claim.metadata.name.as_deref(), Some("kubeperf-n1"));
        let claim_spec = claim.spec.unwrap();
        assert_eq!(claim_spec.storage_class_name.as_deref(), Some("fast"));
        assert_eq!(
            claim_spec.access_modes,
            Some(vec!["ReadWriteOnce".to_string()])
        );
        let requests = claim_spec.resources.unwrap().requests.unwrap();
        assert_eq!(requests["storage"], Quantity("1Gi".to_string()));

        let pod_spec = workload.pod.spec.unwrap();
        assert_eq!(
            pod_spec.security_context.unwrap().fs_group,
            Some(VOLUME_FS_GROUP)
        );
        let volume = &pod_spec.volumes.unwrap()[0];
        assert_eq!(
            volume
                .persistent_volume_claim
                .as_ref()
                .unwrap()
                .claim_name,
            "kubeperf-n1"
        );
    }

    #[test]
    fn scratch_policy_mounts_an_empty_dir_without_a_claim() {
        let workload = build(
            "kubeperf-n1",
            Some("n1"),
            DEFAULT_IMAGE,
            &echo(),
            &VolumePolicy::EphemeralScratch,
        );
        assert!(workload.claim.is_none());
        let spec = workload.pod.spec.unwrap();
        assert!(spec.security_context.is_none());
        assert!(spec.volumes.unwrap()[0].empty_dir.is_some());
    }
}
