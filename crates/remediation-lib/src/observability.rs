//! Observability for the remediation service
//!
//! Provides:
//! - Prometheus metrics (events by kind, outcomes, rejections, latency, cluster errors)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::{FaultKind, RemediationOutcome};

/// Histogram buckets for remediation latency (in seconds). Cluster calls
/// dominate, so the range tops out just above the default call timeout.
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0];

static GLOBAL_METRICS: OnceLock<RemediationMetricsInner> = OnceLock::new();

struct RemediationMetricsInner {
    events_received: IntCounterVec,
    outcomes: IntCounterVec,
    rejections: IntCounterVec,
    remediation_latency_seconds: HistogramVec,
    cluster_errors: IntCounterVec,
}

impl RemediationMetricsInner {
    fn new() -> Self {
        Self {
            events_received: register_int_counter_vec!(
                "fault_remediator_events_received_total",
                "Fault events accepted for remediation",
                &["kind"]
            )
            .expect("Failed to register events_received"),

            outcomes: register_int_counter_vec!(
                "fault_remediator_outcomes_total",
                "Remediation outcomes by fault kind and result",
                &["kind", "result"]
            )
            .expect("Failed to register outcomes"),

            rejections: register_int_counter_vec!(
                "fault_remediator_rejections_total",
                "Events rejected before remediation",
                &["reason"]
            )
            .expect("Failed to register rejections"),

            remediation_latency_seconds: register_histogram_vec!(
                "fault_remediator_remediation_latency_seconds",
                "Time from accepting an event to its outcome, including lock wait",
                &["kind"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register remediation_latency_seconds"),

            cluster_errors: register_int_counter_vec!(
                "fault_remediator_cluster_errors_total",
                "Failed remediations by error class",
                &["reason"]
            )
            .expect("Failed to register cluster_errors"),
        }
    }
}

/// Handle to the process-wide remediation metrics. Clones share the same
/// registered collectors.
#[derive(Clone)]
pub struct RemediationMetrics {
    _private: (),
}

impl Default for RemediationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RemediationMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RemediationMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RemediationMetricsInner {
        GLOBAL_METRICS.get_or_init(RemediationMetricsInner::new)
    }

    pub fn inc_events_received(&self, kind: FaultKind) {
        self.inner()
            .events_received
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn inc_rejections(&self, reason: &str) {
        self.inner().rejections.with_label_values(&[reason]).inc();
    }

    /// Record an outcome, its latency and, for failures, the error class
    pub fn record_outcome(&self, outcome: &RemediationOutcome, duration_secs: f64) {
        let kind = outcome.kind.as_str();
        let result = match (&outcome.failure, &outcome.applied_change) {
            (Some(_), _) => "failed",
            (None, Some(_)) => "applied",
            (None, None) => "skipped",
        };

        let inner = self.inner();
        inner.outcomes.with_label_values(&[kind, result]).inc();
        inner
            .remediation_latency_seconds
            .with_label_values(&[kind])
            .observe(duration_secs);
        if let Some(reason) = outcome.failure {
            inner
                .cluster_errors
                .with_label_values(&[reason.as_str()])
                .inc();
        }
    }

    pub fn outcome_count(&self, kind: FaultKind, result: &str) -> u64 {
        self.inner()
            .outcomes
            .with_label_values(&[kind.as_str(), result])
            .get()
    }

    pub fn rejection_count(&self, reason: &str) -> u64 {
        self.inner().rejections.with_label_values(&[reason]).get()
    }
}

/// Structured logger for remediation lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, dry_run: bool) {
        info!(
            event = "remediator_started",
            instance = %self.instance,
            version = %version,
            dry_run = dry_run,
            "Fault remediator started"
        );
    }

    pub fn log_fault_received(&self, kind: FaultKind, target: &str) {
        info!(
            event = "fault_received",
            instance = %self.instance,
            kind = %kind,
            target = %target,
            "Fault event received"
        );
    }

    pub fn log_outcome(&self, outcome: &RemediationOutcome, duration_ms: u128) {
        let change = outcome.applied_change.as_ref().map(|c| c.to_string());
        if outcome.succeeded {
            info!(
                event = "remediation_outcome",
                instance = %self.instance,
                kind = %outcome.kind,
                target = %outcome.target,
                succeeded = true,
                change = ?change,
                duration_ms = duration_ms as u64,
                "Remediation completed"
            );
        } else {
            warn!(
                event = "remediation_outcome",
                instance = %self.instance,
                kind = %outcome.kind,
                target = %outcome.target,
                succeeded = false,
                failure = ?outcome.failure.map(|f| f.as_str()),
                message = %outcome.message,
                duration_ms = duration_ms as u64,
                "Remediation failed"
            );
        }
    }

    pub fn log_rejected(&self, reason: &str, detail: &str) {
        warn!(
            event = "event_rejected",
            instance = %self.instance,
            reason = %reason,
            detail = %detail,
            "Fault event rejected"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "remediator_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Fault remediator shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppliedChange, FailureReason};

    #[test]
    fn test_record_outcome_counts_by_result() {
        let metrics = RemediationMetrics::new();
        let before_applied = metrics.outcome_count(FaultKind::NodeNotReady, "applied");
        let before_failed = metrics.outcome_count(FaultKind::NodeNotReady, "failed");

        metrics.record_outcome(
            &RemediationOutcome::applied(
                FaultKind::NodeNotReady,
                "node/worker-3",
                "Uncordoned node worker-3 to restore scheduling",
                AppliedChange::NodeUncordoned {
                    name: "worker-3".to_string(),
                },
            ),
            0.02,
        );
        metrics.record_outcome(
            &RemediationOutcome::failed(
                FaultKind::NodeNotReady,
                "node/worker-3",
                "Failed to uncordon node worker-3: timed out",
                FailureReason::Timeout,
            ),
            10.0,
        );

        // Other tests share the global registry, so counts only grow
        assert!(metrics.outcome_count(FaultKind::NodeNotReady, "applied") > before_applied);
        assert!(metrics.outcome_count(FaultKind::NodeNotReady, "failed") > before_failed);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("remediator-0");
        assert_eq!(logger.instance, "remediator-0");
        logger.log_rejected("unknown_kind", "ImagePullBackOff");
    }
}
