//! CrashLoopBackOff: delete the pod so its controller recreates it

use async_trait::async_trait;

use super::{unsupported, ActionContext, RemediationAction};
use crate::cluster::bounded;
use crate::models::{AppliedChange, FaultEvent, FaultKind, PodRef, RemediationOutcome};

pub struct CrashLoopAction {
    ctx: ActionContext,
}

impl CrashLoopAction {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    async fn remediate(&self, pod: &PodRef) -> RemediationOutcome {
        let kind = FaultKind::CrashLoopBackOff;
        let target = pod.to_string();

        if self.ctx.config.guard_pod_state {
            match self.ctx.reader.fetch_pod(&pod.name, &pod.namespace).await {
                Ok(state) if !state.is_crash_looping() => {
                    return self.ctx.report(RemediationOutcome::skipped(
                        kind,
                        target,
                        format!(
                            "Pod {} is no longer in CrashLoopBackOff, leaving it running",
                            pod
                        ),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    return self.ctx.fail(
                        kind,
                        &target,
                        format!("Failed to restart pod {}: {}", pod, e),
                        &e,
                    );
                }
            }
        }

        match bounded(
            self.ctx.timeout(),
            self.ctx.client.delete_pod(&pod.name, &pod.namespace),
        )
        .await
        {
            Ok(()) => self.ctx.report(RemediationOutcome::applied(
                kind,
                target,
                format!("Restarted pod {} to recover from CrashLoopBackOff", pod),
                AppliedChange::PodDeleted {
                    namespace: pod.namespace.clone(),
                    name: pod.name.clone(),
                },
            )),
            Err(e) => self.ctx.fail(
                kind,
                &target,
                format!("Failed to restart pod {}: {}", pod, e),
                &e,
            ),
        }
    }
}

#[async_trait]
impl RemediationAction for CrashLoopAction {
    fn kind(&self) -> FaultKind {
        FaultKind::CrashLoopBackOff
    }

    async fn apply(&self, event: &FaultEvent) -> RemediationOutcome {
        match event {
            FaultEvent::CrashLoopBackOff(pod) => self.remediate(pod).await,
            other => unsupported(self.kind(), other),
        }
    }
}
