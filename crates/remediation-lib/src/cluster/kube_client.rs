//! `kube`-backed cluster client
//!
//! Workload reads and memory patches target the `apps/v1` Deployment with the
//! event's name; pods and nodes are addressed through `core/v1`.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{ClusterClient, ClusterError, MemoryLimitPatch};
use crate::models::{DeclaredLimit, NodeState, PodState, WorkloadDescriptor};

const CRASH_LOOP_REASON: &str = "CrashLoopBackOff";
const FIELD_MANAGER: &str = "fault-remediator";

/// Cluster client talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster config or the default kubeconfig
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Transport(format!("failed to create client: {}", e)))?;
        Ok(Self::new(client))
    }

    /// Connect using an explicit kubeconfig file
    pub async fn from_kubeconfig(path: &Path) -> Result<Self, ClusterError> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
            ClusterError::Transport(format!("failed to read kubeconfig {}: {}", path.display(), e))
        })?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| ClusterError::Transport(format!("invalid kubeconfig: {}", e)))?;
        let client = Client::try_from(config)
            .map_err(|e| ClusterError::Transport(format!("failed to create client: {}", e)))?;
        Ok(Self::new(client))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }
}

/// Map a kube error onto the remediation error taxonomy
fn map_error(err: kube::Error, kind: &'static str, name: &str) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 409 => {
            ClusterError::Conflict(response.message)
        }
        other => ClusterError::Transport(other.to_string()),
    }
}

fn describe_deployment(
    deployment: Deployment,
    name: &str,
    namespace: &str,
) -> Result<WorkloadDescriptor, ClusterError> {
    let container = deployment
        .spec
        .and_then(|spec| spec.template.spec)
        .and_then(|pod_spec| pod_spec.containers.into_iter().next())
        .ok_or_else(|| ClusterError::NotFound {
            kind: "container",
            name: format!("{}/{}", namespace, name),
        })?;

    let memory_limit = container
        .resources
        .and_then(|r| r.limits)
        .and_then(|mut limits| limits.remove("memory"))
        .map_or(DeclaredLimit::Unset, |quantity| DeclaredLimit::parse(&quantity.0));

    Ok(WorkloadDescriptor {
        name: name.to_string(),
        namespace: namespace.to_string(),
        container: container.name,
        memory_limit,
        resource_version: deployment.metadata.resource_version,
    })
}

/// Strategic merge patch touching only one container's memory limit
fn memory_limit_patch_body(patch: &MemoryLimitPatch) -> serde_json::Value {
    let mut body = json!({
        "spec": {
            "template": {
                "spec": {
                    "containers": [{
                        "name": patch.container,
                        "resources": { "limits": { "memory": patch.limit.as_str() } }
                    }]
                }
            }
        }
    });
    if let Some(version) = &patch.resource_version {
        body["metadata"] = json!({ "resourceVersion": version });
    }
    body
}

fn describe_pod(pod: Pod, name: &str, namespace: &str) -> PodState {
    let status = pod.status.unwrap_or_default();
    let crash_looping_containers = status
        .container_statuses
        .unwrap_or_default()
        .into_iter()
        .filter(|cs| {
            cs.state
                .as_ref()
                .and_then(|s| s.waiting.as_ref())
                .and_then(|w| w.reason.as_deref())
                == Some(CRASH_LOOP_REASON)
        })
        .map(|cs| cs.name)
        .collect();

    PodState {
        name: name.to_string(),
        namespace: namespace.to_string(),
        crash_looping_containers,
    }
}

fn describe_node(node: Node, name: &str) -> NodeState {
    let unschedulable = node
        .spec
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false);
    let ready = node
        .status
        .and_then(|status| status.conditions)
        .and_then(|conditions| conditions.into_iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status);

    NodeState {
        name: name.to_string(),
        unschedulable,
        ready,
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_workload(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<WorkloadDescriptor, ClusterError> {
        let deployment = self
            .deployments(namespace)
            .get(name)
            .await
            .map_err(|e| map_error(e, "deployment", name))?;
        describe_deployment(deployment, name, namespace)
    }

    async fn patch_memory_limit(&self, patch: &MemoryLimitPatch) -> Result<(), ClusterError> {
        let body = memory_limit_patch_body(patch);
        debug!(
            name = %patch.name,
            namespace = %patch.namespace,
            container = %patch.container,
            limit = %patch.limit,
            "Patching memory limit"
        );

        self.deployments(&patch.namespace)
            .patch(
                &patch.name,
                &PatchParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    ..PatchParams::default()
                },
                &Patch::Strategic(&body),
            )
            .await
            .map_err(|e| map_error(e, "deployment", &patch.name))?;

        info!(
            name = %patch.name,
            namespace = %patch.namespace,
            limit = %patch.limit,
            "Memory limit patched"
        );
        Ok(())
    }

    async fn get_pod(&self, name: &str, namespace: &str) -> Result<PodState, ClusterError> {
        let pod = self
            .pods(namespace)
            .get(name)
            .await
            .map_err(|e| map_error(e, "pod", name))?;
        Ok(describe_pod(pod, name, namespace))
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_error(e, "pod", name))?;
        info!(name = %name, namespace = %namespace, "Pod deleted");
        Ok(())
    }

    async fn get_node(&self, name: &str) -> Result<NodeState, ClusterError> {
        let node = self
            .nodes()
            .get(name)
            .await
            .map_err(|e| map_error(e, "node", name))?;
        Ok(describe_node(node, name))
    }

    async fn uncordon_node(&self, name: &str) -> Result<(), ClusterError> {
        let body = json!({ "spec": { "unschedulable": false } });
        self.nodes()
            .patch(
                name,
                &PatchParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    ..PatchParams::default()
                },
                &Patch::Merge(&body),
            )
            .await
            .map_err(|e| {
                warn!(node = %name, error = %e, "Uncordon request failed");
                map_error(e, "node", name)
            })?;
        info!(node = %name, "Node uncordoned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{
        Container, ContainerState, ContainerStateWaiting, ContainerStatus, NodeCondition, NodeSpec,
        NodeStatus, PodSpec, PodStatus, PodTemplateSpec, ResourceRequirements,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use crate::quantity::MemoryQuantity;
    use kube::core::ObjectMeta;
    use std::collections::BTreeMap;

    fn deployment(limit: Option<&str>) -> Deployment {
        let limits = limit.map(|l| BTreeMap::from([("memory".to_string(), Quantity(l.to_string()))]));
        Deployment {
            metadata: ObjectMeta {
                name: Some("api-7".to_string()),
                resource_version: Some("4711".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![
                            Container {
                                name: "app".to_string(),
                                resources: Some(ResourceRequirements {
                                    limits,
                                    ..ResourceRequirements::default()
                                }),
                                ..Container::default()
                            },
                            Container {
                                name: "sidecar".to_string(),
                                ..Container::default()
                            },
                        ],
                        ..PodSpec::default()
                    }),
                    ..PodTemplateSpec::default()
                },
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        }
    }

    #[test]
    fn test_describe_deployment_reads_first_container() {
        let descriptor = describe_deployment(deployment(Some("512Mi")), "api-7", "prod").unwrap();
        assert_eq!(descriptor.container, "app");
        assert_eq!(
            descriptor.memory_limit,
            DeclaredLimit::Quantity(MemoryQuantity::mebibytes(512))
        );
        assert_eq!(descriptor.resource_version.as_deref(), Some("4711"));
    }

    #[test]
    fn test_describe_deployment_without_limit() {
        let descriptor = describe_deployment(deployment(None), "api-7", "prod").unwrap();
        assert_eq!(descriptor.memory_limit, DeclaredLimit::Unset);
    }

    #[test]
    fn test_describe_deployment_accepts_exponent_and_milli_limits() {
        let descriptor = describe_deployment(deployment(Some("129e6")), "api-7", "prod").unwrap();
        assert_eq!(
            descriptor.memory_limit,
            DeclaredLimit::Quantity("129M".parse().unwrap())
        );

        let descriptor =
            describe_deployment(deployment(Some("128974848000m")), "api-7", "prod").unwrap();
        match descriptor.memory_limit {
            DeclaredLimit::Quantity(limit) => assert_eq!(limit.bytes(), 128_974_848),
            other => panic!("expected a quantity, got {:?}", other),
        }
    }

    #[test]
    fn test_describe_deployment_keeps_unreadable_limit() {
        let descriptor = describe_deployment(deployment(Some("lots")), "api-7", "prod").unwrap();
        assert_eq!(
            descriptor.memory_limit,
            DeclaredLimit::Unreadable("lots".to_string())
        );
    }

    #[test]
    fn test_describe_deployment_without_containers() {
        let err = describe_deployment(Deployment::default(), "api-7", "prod").unwrap_err();
        assert!(matches!(err, ClusterError::NotFound { kind: "container", .. }));
    }

    #[test]
    fn test_patch_body_targets_single_container() {
        let patch = MemoryLimitPatch {
            name: "api-7".to_string(),
            namespace: "prod".to_string(),
            container: "app".to_string(),
            limit: MemoryQuantity::gibibytes(1),
            resource_version: Some("4711".to_string()),
        };

        let body = memory_limit_patch_body(&patch);
        let containers = body["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0]["name"], "app");
        assert_eq!(containers[0]["resources"]["limits"]["memory"], "1Gi");
        assert_eq!(body["metadata"]["resourceVersion"], "4711");
    }

    #[test]
    fn test_patch_body_without_precondition() {
        let patch = MemoryLimitPatch {
            name: "api-7".to_string(),
            namespace: "prod".to_string(),
            container: "app".to_string(),
            limit: MemoryQuantity::gibibytes(2),
            resource_version: None,
        };

        let body = memory_limit_patch_body(&patch);
        assert!(body.get("metadata").is_none());
    }

    #[test]
    fn test_describe_pod_finds_crash_looping_containers() {
        let pod = Pod {
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                container_statuses: Some(vec![ContainerStatus {
                    name: "worker".to_string(),
                    state: Some(ContainerState {
                        waiting: Some(ContainerStateWaiting {
                            reason: Some("CrashLoopBackOff".to_string()),
                            ..ContainerStateWaiting::default()
                        }),
                        ..ContainerState::default()
                    }),
                    ..ContainerStatus::default()
                }]),
                ..PodStatus::default()
            }),
            ..Pod::default()
        };

        let state = describe_pod(pod, "worker-2", "batch");
        assert!(state.is_crash_looping());
        assert_eq!(state.crash_looping_containers, vec!["worker".to_string()]);
    }

    #[test]
    fn test_describe_node() {
        let node = Node {
            spec: Some(NodeSpec {
                unschedulable: Some(true),
                ..NodeSpec::default()
            }),
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: "False".to_string(),
                    ..NodeCondition::default()
                }]),
                ..NodeStatus::default()
            }),
            ..Node::default()
        };

        let state = describe_node(node, "worker-3");
        assert!(state.unschedulable);
        assert_eq!(state.ready.as_deref(), Some("False"));

        let bare = describe_node(Node::default(), "worker-4");
        assert!(!bare.unschedulable);
        assert_eq!(bare.ready, None);
    }
}
