//! NodeNotReady: mark the node schedulable again

use async_trait::async_trait;
use tracing::debug;

use super::{unsupported, ActionContext, RemediationAction};
use crate::cluster::bounded;
use crate::models::{AppliedChange, FaultEvent, FaultKind, NodeRef, RemediationOutcome};

pub struct NodeNotReadyAction {
    ctx: ActionContext,
}

impl NodeNotReadyAction {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    async fn remediate(&self, node: &NodeRef) -> RemediationOutcome {
        let kind = FaultKind::NodeNotReady;
        let target = node.to_string();

        if self.ctx.config.guard_node_state {
            match self.ctx.reader.fetch_node(&node.name).await {
                Ok(state) if !state.unschedulable => {
                    return self.ctx.report(RemediationOutcome::skipped(
                        kind,
                        target,
                        format!("Node {} is already schedulable", node.name),
                    ));
                }
                Ok(state) => {
                    debug!(node = %node.name, ready = ?state.ready, "Node is cordoned");
                }
                Err(e) => {
                    return self.ctx.fail(
                        kind,
                        &target,
                        format!("Failed to uncordon node {}: {}", node.name, e),
                        &e,
                    );
                }
            }
        }

        match bounded(self.ctx.timeout(), self.ctx.client.uncordon_node(&node.name)).await {
            Ok(()) => self.ctx.report(RemediationOutcome::applied(
                kind,
                target,
                format!("Uncordoned node {} to restore scheduling", node.name),
                AppliedChange::NodeUncordoned {
                    name: node.name.clone(),
                },
            )),
            Err(e) => self.ctx.fail(
                kind,
                &target,
                format!("Failed to uncordon node {}: {}", node.name, e),
                &e,
            ),
        }
    }
}

#[async_trait]
impl RemediationAction for NodeNotReadyAction {
    fn kind(&self) -> FaultKind {
        FaultKind::NodeNotReady
    }

    async fn apply(&self, event: &FaultEvent) -> RemediationOutcome {
        match event {
            FaultEvent::NodeNotReady(node) => self.remediate(node).await,
            other => unsupported(self.kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterError;
    use crate::models::{FailureReason, PodRef};
    use crate::policy::RemediationConfig;
    use crate::testing::{ClusterCall, FakeCluster, Operation, RecordingSink};
    use std::sync::Arc;

    fn not_ready(name: &str) -> FaultEvent {
        FaultEvent::NodeNotReady(NodeRef::new(name))
    }

    fn action(
        cluster: Arc<FakeCluster>,
        sink: Arc<RecordingSink>,
        config: RemediationConfig,
    ) -> NodeNotReadyAction {
        NodeNotReadyAction::new(ActionContext::new(cluster, sink, config))
    }

    #[tokio::test]
    async fn test_uncordons_cordoned_node() {
        let cluster = Arc::new(FakeCluster::new().with_node("worker-3", true));
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink.clone(), RemediationConfig::default())
            .apply(&not_ready("worker-3"))
            .await;

        assert!(outcome.succeeded);
        assert_eq!(
            cluster.mutations(),
            vec![ClusterCall::UncordonNode {
                name: "worker-3".to_string()
            }]
        );
        assert_eq!(cluster.is_unschedulable("worker-3"), Some(false));
        assert!(sink.messages()[0].contains("worker-3"));
    }

    #[tokio::test]
    async fn test_guard_skips_schedulable_node() {
        let cluster = Arc::new(FakeCluster::new().with_node("worker-3", false));
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink, RemediationConfig::guarded())
            .apply(&not_ready("worker-3"))
            .await;

        assert!(outcome.succeeded);
        assert!(outcome.applied_change.is_none());
        assert!(cluster.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_default_uncordons_without_reading() {
        let cluster = Arc::new(FakeCluster::new().with_node("worker-3", false));
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink, RemediationConfig::default())
            .apply(&not_ready("worker-3"))
            .await;

        assert!(outcome.succeeded);
        assert!(cluster.reads().is_empty());
        assert_eq!(cluster.mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_uncordon_failure_is_reported() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_node("worker-3", true)
                .with_failure(
                    Operation::UncordonNode,
                    ClusterError::Transport("tls handshake failed".to_string()),
                ),
        );
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster, sink.clone(), RemediationConfig::default())
            .apply(&not_ready("worker-3"))
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, Some(FailureReason::Transport));
        assert!(sink.messages()[0].contains("tls handshake failed"));
    }

    #[tokio::test]
    async fn test_rejects_pod_event() {
        let cluster = Arc::new(FakeCluster::new());
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink.clone(), RemediationConfig::default())
            .apply(&FaultEvent::OomKilled(PodRef::new("api-7", "prod")))
            .await;

        assert_eq!(outcome.failure, Some(FailureReason::Unsupported));
        assert!(cluster.calls().is_empty());
        assert!(sink.messages().is_empty());
    }
}
