//! OOMKilled: raise the first container's memory limit one rung up the ladder

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{unsupported, ActionContext, RemediationAction};
use crate::cluster::{bounded, ClusterError, MemoryLimitPatch};
use crate::models::{
    AppliedChange, DeclaredLimit, FaultEvent, FaultKind, PodRef, RemediationOutcome,
};

pub struct OomKilledAction {
    ctx: ActionContext,
}

impl OomKilledAction {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    async fn remediate(&self, pod: &PodRef) -> RemediationOutcome {
        let kind = FaultKind::OomKilled;
        let target = pod.to_string();
        let config = &self.ctx.config;
        let mut conflicts = 0;

        loop {
            let workload = match self.ctx.reader.fetch_workload(&pod.name, &pod.namespace).await {
                Ok(workload) => workload,
                Err(e) => {
                    return self.ctx.fail(
                        kind,
                        &target,
                        format!("Failed to get workload details for {}: {}", target, e),
                        &e,
                    );
                }
            };

            let (current, next) = match &workload.memory_limit {
                DeclaredLimit::Unset => (
                    config.default_memory_limit.to_string(),
                    config.ladder.next(&config.default_memory_limit),
                ),
                DeclaredLimit::Quantity(limit) => (limit.to_string(), config.ladder.next(limit)),
                DeclaredLimit::Unreadable(text) => {
                    warn!(
                        target = %target,
                        limit = %text,
                        "Memory limit is not a valid quantity, using the ladder fallback"
                    );
                    (text.clone(), config.ladder.fallback.clone())
                }
            };
            debug!(
                target = %target,
                container = %workload.container,
                current = %current,
                next = %next,
                "Computed new memory limit"
            );

            let patch = MemoryLimitPatch {
                name: workload.name.clone(),
                namespace: workload.namespace.clone(),
                container: workload.container.clone(),
                limit: next.clone(),
                resource_version: workload.resource_version.clone(),
            };

            match bounded(self.ctx.timeout(), self.ctx.client.patch_memory_limit(&patch)).await {
                Ok(()) => {
                    let message = format!(
                        "Increased memory limit of container {} in {} from {} to {}",
                        workload.container, target, current, next
                    );
                    return self.ctx.report(RemediationOutcome::applied(
                        kind,
                        target,
                        message,
                        AppliedChange::MemoryLimitRaised {
                            container: workload.container,
                            from: current,
                            to: next,
                        },
                    ));
                }
                Err(ClusterError::Conflict(reason)) if conflicts < config.conflict_retries => {
                    conflicts += 1;
                    warn!(
                        target = %target,
                        attempt = conflicts,
                        reason = %reason,
                        "Workload changed while patching, re-reading"
                    );
                }
                Err(e) => {
                    return self.ctx.fail(
                        kind,
                        &target,
                        format!("Failed to patch memory limit for {}: {}", target, e),
                        &e,
                    );
                }
            }
        }
    }
}

#[async_trait]
impl RemediationAction for OomKilledAction {
    fn kind(&self) -> FaultKind {
        FaultKind::OomKilled
    }

    async fn apply(&self, event: &FaultEvent) -> RemediationOutcome {
        match event {
            FaultEvent::OomKilled(pod) => self.remediate(pod).await,
            other => unsupported(self.kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterError;
    use crate::models::{FailureReason, NodeRef};
    use crate::policy::RemediationConfig;
    use crate::quantity::MemoryQuantity;
    use crate::testing::{ClusterCall, FakeCluster, Operation, RecordingSink};
    use std::sync::Arc;
    use std::time::Duration;

    fn action(cluster: Arc<FakeCluster>, sink: Arc<RecordingSink>) -> OomKilledAction {
        OomKilledAction::new(ActionContext::new(cluster, sink, RemediationConfig::default()))
    }

    fn oom(name: &str, namespace: &str) -> FaultEvent {
        FaultEvent::OomKilled(PodRef::new(name, namespace))
    }

    fn patched_limits(cluster: &FakeCluster) -> Vec<String> {
        cluster
            .mutations()
            .into_iter()
            .filter_map(|call| match call {
                ClusterCall::PatchMemoryLimit { limit, .. } => Some(limit),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_512mi_escalates_to_1gi() {
        let cluster = Arc::new(FakeCluster::new().with_workload("prod", "api-7", Some("512Mi")));
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink.clone()).apply(&oom("api-7", "prod")).await;

        assert!(outcome.succeeded);
        assert_eq!(patched_limits(&cluster), vec!["1Gi"]);
        assert!(outcome.message.contains("512Mi"));
        assert!(outcome.message.contains("1Gi"));
        assert_eq!(
            outcome.applied_change,
            Some(AppliedChange::MemoryLimitRaised {
                container: "app".to_string(),
                from: "512Mi".to_string(),
                to: MemoryQuantity::gibibytes(1),
            })
        );
        assert_eq!(sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_limit_takes_fallback() {
        let cluster = Arc::new(FakeCluster::new().with_workload("prod", "api-7", Some("lots")));
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink).apply(&oom("api-7", "prod")).await;

        assert!(outcome.succeeded);
        assert_eq!(patched_limits(&cluster), vec!["2Gi"]);
        assert!(outcome.message.contains("from lots to 2Gi"));
    }

    #[tokio::test]
    async fn test_other_limits_go_to_2gi() {
        for current in ["1Gi", "2Gi", "768Mi", "4Gi", "129e6", "128974848000m"] {
            let cluster = Arc::new(FakeCluster::new().with_workload("prod", "api-7", Some(current)));
            let sink = Arc::new(RecordingSink::new());

            let outcome = action(cluster.clone(), sink).apply(&oom("api-7", "prod")).await;

            assert!(outcome.succeeded, "current = {}", current);
            assert_eq!(patched_limits(&cluster), vec!["2Gi"], "current = {}", current);
        }
    }

    #[tokio::test]
    async fn test_missing_limit_defaults_to_512mi() {
        let cluster = Arc::new(FakeCluster::new().with_workload("prod", "api-7", None));
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink).apply(&oom("api-7", "prod")).await;

        assert!(outcome.succeeded);
        assert_eq!(patched_limits(&cluster), vec!["1Gi"]);
    }

    #[tokio::test]
    async fn test_patch_carries_resource_version() {
        let cluster = Arc::new(FakeCluster::new().with_workload("prod", "api-7", Some("512Mi")));
        let sink = Arc::new(RecordingSink::new());

        action(cluster.clone(), sink).apply(&oom("api-7", "prod")).await;

        match &cluster.mutations()[0] {
            ClusterCall::PatchMemoryLimit {
                container,
                resource_version,
                ..
            } => {
                assert_eq!(container, "app");
                assert_eq!(resource_version.as_deref(), Some("1"));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_patch_and_notifies() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_workload("prod", "api-7", Some("512Mi"))
                .with_failure(
                    Operation::GetWorkload,
                    ClusterError::Transport("connection refused".to_string()),
                ),
        );
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink.clone()).apply(&oom("api-7", "prod")).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, Some(FailureReason::Transport));
        assert!(cluster.mutations().is_empty());
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn test_workload_not_found() {
        let cluster = Arc::new(FakeCluster::new());
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink).apply(&oom("ghost", "prod")).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, Some(FailureReason::NotFound));
        assert!(cluster.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_patch_failure_reports_error() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_workload("prod", "api-7", Some("512Mi"))
                .with_failure(
                    Operation::PatchMemoryLimit,
                    ClusterError::Transport("forbidden".to_string()),
                ),
        );
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink.clone()).apply(&oom("api-7", "prod")).await;

        assert!(!outcome.succeeded);
        assert!(outcome.applied_change.is_none());
        assert!(sink.messages()[0].contains("forbidden"));
        assert_eq!(cluster.memory_limit("prod", "api-7"), Some(MemoryQuantity::mebibytes(512)));
    }

    #[tokio::test]
    async fn test_conflict_rereads_and_retries_once() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_workload("prod", "api-7", Some("512Mi"))
                .with_conflicts(1),
        );
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink).apply(&oom("api-7", "prod")).await;

        assert!(outcome.succeeded);
        let reads = cluster
            .reads()
            .into_iter()
            .filter(|c| matches!(c, ClusterCall::GetWorkload { .. }))
            .count();
        assert_eq!(reads, 2);
        assert_eq!(patched_limits(&cluster).len(), 2);
    }

    #[tokio::test]
    async fn test_conflicts_beyond_retry_budget_fail() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_workload("prod", "api-7", Some("512Mi"))
                .with_conflicts(2),
        );
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink).apply(&oom("api-7", "prod")).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, Some(FailureReason::Conflict));
    }

    #[tokio::test]
    async fn test_slow_cluster_times_out() {
        let cluster = Arc::new(
            FakeCluster::new()
                .with_workload("prod", "api-7", Some("512Mi"))
                .with_delay(Duration::from_secs(30)),
        );
        let sink = Arc::new(RecordingSink::new());
        let config = RemediationConfig {
            cluster_timeout_secs: 1,
            ..RemediationConfig::default()
        };
        let action = OomKilledAction::new(ActionContext::new(cluster.clone(), sink, config));

        tokio::time::pause();
        let outcome = action.apply(&oom("api-7", "prod")).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, Some(FailureReason::Timeout));
        assert!(cluster.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_foreign_event_kind() {
        let cluster = Arc::new(FakeCluster::new());
        let sink = Arc::new(RecordingSink::new());

        let outcome = action(cluster.clone(), sink)
            .apply(&FaultEvent::NodeNotReady(NodeRef::new("worker-3")))
            .await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, Some(FailureReason::Unsupported));
        assert!(cluster.calls().is_empty());
    }
}
