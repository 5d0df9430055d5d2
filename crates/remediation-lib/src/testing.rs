//! In-memory collaborators for tests and local experiments
//!
//! [`FakeCluster`] records every call it receives and keeps just enough
//! state (memory limits, resource versions, pod and node conditions) for the
//! remediation actions to behave as they would against a real cluster.
//! [`RecordingSink`] captures notifications.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::cluster::{ClusterClient, ClusterError, MemoryLimitPatch};
use crate::models::{DeclaredLimit, NodeState, PodState, WorkloadDescriptor};
use crate::notify::NotificationSink;
use crate::quantity::MemoryQuantity;

/// Cluster operation selector for injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetWorkload,
    PatchMemoryLimit,
    GetPod,
    DeletePod,
    GetNode,
    UncordonNode,
}

/// A call observed by [`FakeCluster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    GetWorkload {
        name: String,
        namespace: String,
    },
    PatchMemoryLimit {
        name: String,
        namespace: String,
        container: String,
        limit: String,
        resource_version: Option<String>,
    },
    GetPod {
        name: String,
        namespace: String,
    },
    DeletePod {
        name: String,
        namespace: String,
    },
    GetNode {
        name: String,
    },
    UncordonNode {
        name: String,
    },
}

impl ClusterCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ClusterCall::PatchMemoryLimit { .. }
                | ClusterCall::DeletePod { .. }
                | ClusterCall::UncordonNode { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct FakeWorkload {
    container: String,
    memory_limit: DeclaredLimit,
    resource_version: u64,
}

#[derive(Default)]
struct FakeState {
    workloads: HashMap<(String, String), FakeWorkload>,
    pods: HashMap<(String, String), bool>,
    nodes: HashMap<String, bool>,
    failures: HashMap<Operation, ClusterError>,
    pending_conflicts: usize,
    calls: Vec<ClusterCall>,
}

/// Recording in-memory cluster
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a deployment whose first container is `app`. The limit text is
    /// kept as written, so unreadable limits can be simulated too.
    pub fn with_workload(self, namespace: &str, name: &str, memory_limit: Option<&str>) -> Self {
        let memory_limit = memory_limit.map_or(DeclaredLimit::Unset, DeclaredLimit::parse);
        self.state.lock().unwrap().workloads.insert(
            (namespace.to_string(), name.to_string()),
            FakeWorkload {
                container: "app".to_string(),
                memory_limit,
                resource_version: 1,
            },
        );
        self
    }

    pub fn with_crash_looping_pod(self, namespace: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .pods
            .insert((namespace.to_string(), name.to_string()), true);
        self
    }

    pub fn with_running_pod(self, namespace: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .pods
            .insert((namespace.to_string(), name.to_string()), false);
        self
    }

    pub fn with_node(self, name: &str, unschedulable: bool) -> Self {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(name.to_string(), unschedulable);
        self
    }

    /// Make every call of `operation` fail with `error`
    pub fn with_failure(self, operation: Operation, error: ClusterError) -> Self {
        self.state.lock().unwrap().failures.insert(operation, error);
        self
    }

    /// Simulate a concurrent writer: the next `count` patches bump the
    /// resource version and fail with a conflict
    pub fn with_conflicts(self, count: usize) -> Self {
        self.state.lock().unwrap().pending_conflicts = count;
        self
    }

    /// Delay every call, useful for timeout and concurrency tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<ClusterCall> {
        self.calls().into_iter().filter(ClusterCall::is_mutation).collect()
    }

    pub fn reads(&self) -> Vec<ClusterCall> {
        self.calls().into_iter().filter(|c| !c.is_mutation()).collect()
    }

    /// Highest number of calls observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn memory_limit(&self, namespace: &str, name: &str) -> Option<MemoryQuantity> {
        self.state
            .lock()
            .unwrap()
            .workloads
            .get(&(namespace.to_string(), name.to_string()))
            .and_then(|w| match &w.memory_limit {
                DeclaredLimit::Quantity(quantity) => Some(quantity.clone()),
                _ => None,
            })
    }

    pub fn is_unschedulable(&self, name: &str) -> Option<bool> {
        self.state.lock().unwrap().nodes.get(name).copied()
    }

    async fn enter(&self, call: ClusterCall, operation: Operation) -> Result<(), ClusterError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            match state.failures.get(&operation) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_workload(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<WorkloadDescriptor, ClusterError> {
        self.enter(
            ClusterCall::GetWorkload {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            Operation::GetWorkload,
        )
        .await?;

        let state = self.state.lock().unwrap();
        let workload = state
            .workloads
            .get(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| ClusterError::NotFound {
                kind: "deployment",
                name: name.to_string(),
            })?;

        Ok(WorkloadDescriptor {
            name: name.to_string(),
            namespace: namespace.to_string(),
            container: workload.container.clone(),
            memory_limit: workload.memory_limit.clone(),
            resource_version: Some(workload.resource_version.to_string()),
        })
    }

    async fn patch_memory_limit(&self, patch: &MemoryLimitPatch) -> Result<(), ClusterError> {
        self.enter(
            ClusterCall::PatchMemoryLimit {
                name: patch.name.clone(),
                namespace: patch.namespace.clone(),
                container: patch.container.clone(),
                limit: patch.limit.to_string(),
                resource_version: patch.resource_version.clone(),
            },
            Operation::PatchMemoryLimit,
        )
        .await?;

        let mut state = self.state.lock().unwrap();
        let conflict = if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            true
        } else {
            false
        };

        let workload = state
            .workloads
            .get_mut(&(patch.namespace.clone(), patch.name.clone()))
            .ok_or_else(|| ClusterError::NotFound {
                kind: "deployment",
                name: patch.name.clone(),
            })?;

        if conflict {
            workload.resource_version += 1;
            return Err(ClusterError::Conflict(format!(
                "deployment {} was modified concurrently",
                patch.name
            )));
        }

        if let Some(expected) = &patch.resource_version {
            if *expected != workload.resource_version.to_string() {
                return Err(ClusterError::Conflict(format!(
                    "resource version {} is stale",
                    expected
                )));
            }
        }

        workload.memory_limit = DeclaredLimit::Quantity(patch.limit.clone());
        workload.resource_version += 1;
        Ok(())
    }

    async fn get_pod(&self, name: &str, namespace: &str) -> Result<PodState, ClusterError> {
        self.enter(
            ClusterCall::GetPod {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            Operation::GetPod,
        )
        .await?;

        let state = self.state.lock().unwrap();
        let crash_looping = *state
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| ClusterError::NotFound {
                kind: "pod",
                name: name.to_string(),
            })?;

        Ok(PodState {
            name: name.to_string(),
            namespace: namespace.to_string(),
            crash_looping_containers: if crash_looping {
                vec!["app".to_string()]
            } else {
                vec![]
            },
        })
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        self.enter(
            ClusterCall::DeletePod {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            Operation::DeletePod,
        )
        .await?;

        self.state
            .lock()
            .unwrap()
            .pods
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn get_node(&self, name: &str) -> Result<NodeState, ClusterError> {
        self.enter(
            ClusterCall::GetNode {
                name: name.to_string(),
            },
            Operation::GetNode,
        )
        .await?;

        let state = self.state.lock().unwrap();
        let unschedulable = *state.nodes.get(name).ok_or_else(|| ClusterError::NotFound {
            kind: "node",
            name: name.to_string(),
        })?;

        Ok(NodeState {
            name: name.to_string(),
            unschedulable,
            ready: Some("False".to_string()),
        })
    }

    async fn uncordon_node(&self, name: &str) -> Result<(), ClusterError> {
        self.enter(
            ClusterCall::UncordonNode {
                name: name.to_string(),
            },
            Operation::UncordonNode,
        )
        .await?;

        if let Some(unschedulable) = self.state.lock().unwrap().nodes.get_mut(name) {
            *unschedulable = false;
        }
        Ok(())
    }
}

/// Notification sink that keeps every message
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn send(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}
