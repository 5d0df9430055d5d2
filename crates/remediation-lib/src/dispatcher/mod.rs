//! Event dispatcher
//!
//! Validates inbound events, routes each one to the action registered for its
//! kind and returns a tagged [`DispatchResult`]. Remediations of the same
//! target never overlap; different targets run concurrently.

mod locks;

pub use locks::{TargetGuard, TargetLocks};

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::actions::{default_actions, ActionContext, RemediationAction};
use crate::cluster::ClusterClient;
use crate::event::{parse_event, EventError};
use crate::health::HealthRegistry;
use crate::models::{FailureReason, FaultEvent, FaultKind, RemediationOutcome};
use crate::notify::NotificationSink;
use crate::observability::{RemediationMetrics, StructuredLogger};
use crate::policy::RemediationConfig;

/// Why an event was not handed to any action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Well-formed event of a kind nothing remediates
    UnknownKind(String),
    /// Missing detail, status or a required identifier
    Malformed(EventError),
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnknownKind(_) => "unknown_kind",
            RejectReason::Malformed(_) => "malformed",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnknownKind(kind) => write!(f, "unrecognized fault kind '{}'", kind),
            RejectReason::Malformed(e) => write!(f, "malformed event: {}", e),
        }
    }
}

/// Result of handling one inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    Handled(RemediationOutcome),
    Rejected(RejectReason),
}

impl DispatchResult {
    pub fn succeeded(&self) -> bool {
        matches!(self, DispatchResult::Handled(outcome) if outcome.succeeded)
    }
}

pub struct Dispatcher {
    actions: HashMap<FaultKind, Arc<dyn RemediationAction>>,
    notifier: Arc<dyn NotificationSink>,
    locks: TargetLocks,
    metrics: RemediationMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl Dispatcher {
    /// Dispatcher with the built-in action for every fault kind
    pub fn new(
        client: Arc<dyn ClusterClient>,
        notifier: Arc<dyn NotificationSink>,
        config: RemediationConfig,
    ) -> Self {
        let ctx = ActionContext::new(client, notifier.clone(), config);
        let mut dispatcher = Self::empty(notifier);
        for action in default_actions(&ctx) {
            dispatcher = dispatcher.with_action(action);
        }
        dispatcher
    }

    /// Dispatcher with no registered actions
    pub fn empty(notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            actions: HashMap::new(),
            notifier,
            locks: TargetLocks::new(),
            metrics: RemediationMetrics::new(),
            logger: StructuredLogger::new("fault-remediator"),
            health: None,
        }
    }

    /// Register `action` for its kind, replacing any previous one
    pub fn with_action(mut self, action: Arc<dyn RemediationAction>) -> Self {
        self.actions.insert(action.kind(), action);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Report cluster connectivity into `health` after every outcome
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn registered_kinds(&self) -> Vec<FaultKind> {
        FaultKind::ALL
            .into_iter()
            .filter(|kind| self.actions.contains_key(kind))
            .collect()
    }

    /// Validate a raw payload and remediate it
    pub async fn handle(&self, payload: &Value) -> DispatchResult {
        match parse_event(payload) {
            Ok(event) => DispatchResult::Handled(self.dispatch(event).await),
            Err(EventError::UnknownKind(kind)) => {
                self.logger.log_rejected("unknown_kind", &kind);
                self.metrics.inc_rejections("unknown_kind");
                DispatchResult::Rejected(RejectReason::UnknownKind(kind))
            }
            Err(e) => {
                let reason = RejectReason::Malformed(e);
                self.logger.log_rejected(reason.as_str(), &reason.to_string());
                self.metrics.inc_rejections(reason.as_str());
                self.notifier
                    .send(&format!("Rejected fault event: {}", reason));
                DispatchResult::Rejected(reason)
            }
        }
    }

    /// Remediate an already validated event
    pub async fn dispatch(&self, event: FaultEvent) -> RemediationOutcome {
        let kind = event.kind();
        let target = event.target();
        self.logger.log_fault_received(kind, &target);
        self.metrics.inc_events_received(kind);

        let started = Instant::now();
        let outcome = match self.actions.get(&kind) {
            Some(action) => {
                let key = event.lock_key();
                debug!(lock = %key, "Waiting for target lock");
                let _guard = self.locks.acquire(&key).await;
                action.apply(&event).await
            }
            None => {
                let message = format!("No remediation action registered for {}", kind);
                warn!(kind = %kind, target = %target, "{}", message);
                self.notifier.send(&message);
                RemediationOutcome::failed(kind, target, message, FailureReason::Unsupported)
            }
        };

        let elapsed = started.elapsed();
        self.metrics.record_outcome(&outcome, elapsed.as_secs_f64());
        self.logger.log_outcome(&outcome, elapsed.as_millis());
        if let Some(health) = &self.health {
            health.observe_outcome(&outcome).await;
        }
        outcome
    }
}
