//! Dry-run wrapper: real reads, logged mutations

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{ClusterClient, ClusterError, MemoryLimitPatch};
use crate::models::{NodeState, PodState, WorkloadDescriptor};

/// Forwards reads to the wrapped client and reports every mutation as
/// successful without sending it
pub struct DryRunClusterClient {
    inner: Arc<dyn ClusterClient>,
}

impl DryRunClusterClient {
    pub fn new(inner: Arc<dyn ClusterClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ClusterClient for DryRunClusterClient {
    async fn get_workload(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<WorkloadDescriptor, ClusterError> {
        self.inner.get_workload(name, namespace).await
    }

    async fn patch_memory_limit(&self, patch: &MemoryLimitPatch) -> Result<(), ClusterError> {
        info!(
            dry_run = true,
            name = %patch.name,
            namespace = %patch.namespace,
            container = %patch.container,
            limit = %patch.limit,
            "Would patch memory limit"
        );
        Ok(())
    }

    async fn get_pod(&self, name: &str, namespace: &str) -> Result<PodState, ClusterError> {
        self.inner.get_pod(name, namespace).await
    }

    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        info!(dry_run = true, name = %name, namespace = %namespace, "Would delete pod");
        Ok(())
    }

    async fn get_node(&self, name: &str) -> Result<NodeState, ClusterError> {
        self.inner.get_node(name).await
    }

    async fn uncordon_node(&self, name: &str) -> Result<(), ClusterError> {
        info!(dry_run = true, node = %name, "Would uncordon node");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::MemoryQuantity;
    use crate::testing::FakeCluster;

    #[tokio::test]
    async fn test_dry_run_never_mutates() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_workload("prod", "api-7", Some("512Mi"))
                .with_crash_looping_pod("batch", "worker-2")
                .with_node("worker-3", true),
        );
        let client = DryRunClusterClient::new(fake.clone());

        let workload = client.get_workload("api-7", "prod").await.unwrap();
        client
            .patch_memory_limit(&MemoryLimitPatch {
                name: workload.name.clone(),
                namespace: workload.namespace.clone(),
                container: workload.container.clone(),
                limit: MemoryQuantity::gibibytes(1),
                resource_version: workload.resource_version.clone(),
            })
            .await
            .unwrap();
        client.delete_pod("worker-2", "batch").await.unwrap();
        client.uncordon_node("worker-3").await.unwrap();

        assert!(fake.mutations().is_empty());
        assert_eq!(fake.reads().len(), 1);
    }
}
