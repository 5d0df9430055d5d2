//! Read-only, timeout-bounded access to cluster state

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{ClusterClient, ClusterError};
use crate::models::{NodeState, PodState, WorkloadDescriptor};

/// Default bound on any single cluster call
pub const DEFAULT_CLUSTER_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a cluster call with an upper bound on its duration
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, ClusterError>
where
    F: Future<Output = Result<T, ClusterError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ClusterError::Timeout(timeout)),
    }
}

/// Cluster state reader. Never mutates and never retries; callers decide
/// what a failed read means.
#[derive(Clone)]
pub struct StateReader {
    client: Arc<dyn ClusterClient>,
    timeout: Duration,
}

impl StateReader {
    pub fn new(client: Arc<dyn ClusterClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch_workload(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<WorkloadDescriptor, ClusterError> {
        debug!(name = %name, namespace = %namespace, "Fetching workload");
        bounded(self.timeout, self.client.get_workload(name, namespace)).await
    }

    pub async fn fetch_pod(&self, name: &str, namespace: &str) -> Result<PodState, ClusterError> {
        debug!(name = %name, namespace = %namespace, "Fetching pod state");
        bounded(self.timeout, self.client.get_pod(name, namespace)).await
    }

    pub async fn fetch_node(&self, name: &str) -> Result<NodeState, ClusterError> {
        debug!(node = %name, "Fetching node state");
        bounded(self.timeout, self.client.get_node(name)).await
    }
}
