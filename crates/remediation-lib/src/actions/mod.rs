//! Remediation actions, one per fault kind
//!
//! Every action follows the same contract: read what it needs, decide, apply,
//! then report. Failures never escape as errors; they become a failed
//! [`RemediationOutcome`] plus a notification.

mod crash_loop;
mod node_not_ready;
mod oom;

pub use crash_loop::CrashLoopAction;
pub use node_not_ready::NodeNotReadyAction;
pub use oom::OomKilledAction;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cluster::{ClusterClient, ClusterError, StateReader};
use crate::models::{FailureReason, FaultEvent, FaultKind, RemediationOutcome};
use crate::notify::NotificationSink;
use crate::policy::RemediationConfig;

/// Corrective operation bound to one fault kind
#[async_trait]
pub trait RemediationAction: Send + Sync {
    fn kind(&self) -> FaultKind;

    async fn apply(&self, event: &FaultEvent) -> RemediationOutcome;
}

/// Collaborators and settings shared by all actions
#[derive(Clone)]
pub struct ActionContext {
    pub client: Arc<dyn ClusterClient>,
    pub reader: StateReader,
    pub notifier: Arc<dyn NotificationSink>,
    pub config: Arc<RemediationConfig>,
}

impl ActionContext {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        notifier: Arc<dyn NotificationSink>,
        config: RemediationConfig,
    ) -> Self {
        let reader = StateReader::new(client.clone(), config.cluster_timeout());
        Self {
            client,
            reader,
            notifier,
            config: Arc::new(config),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.reader.timeout()
    }

    /// Notify and return a successful outcome
    fn report(&self, outcome: RemediationOutcome) -> RemediationOutcome {
        info!(
            kind = %outcome.kind,
            target = %outcome.target,
            changed = outcome.applied_change.is_some(),
            "{}",
            outcome.message
        );
        self.notifier.send(&outcome.message);
        outcome
    }

    /// Notify and return a failed outcome for a cluster error
    fn fail(
        &self,
        kind: FaultKind,
        target: &str,
        message: String,
        err: &ClusterError,
    ) -> RemediationOutcome {
        warn!(kind = %kind, target = %target, error = %err, "{}", message);
        self.notifier.send(&message);
        RemediationOutcome::failed(kind, target, message, err.reason())
    }
}

/// Outcome for an event handed to an action of a different kind
fn unsupported(action: FaultKind, event: &FaultEvent) -> RemediationOutcome {
    let message = format!(
        "{} action cannot remediate a {} event",
        action,
        event.kind()
    );
    warn!(action = %action, event_kind = %event.kind(), "{}", message);
    RemediationOutcome::failed(event.kind(), event.target(), message, FailureReason::Unsupported)
}

/// The three built-in actions, sharing one context
pub fn default_actions(ctx: &ActionContext) -> Vec<Arc<dyn RemediationAction>> {
    vec![
        Arc::new(OomKilledAction::new(ctx.clone())),
        Arc::new(CrashLoopAction::new(ctx.clone())),
        Arc::new(NodeNotReadyAction::new(ctx.clone())),
    ]
}
