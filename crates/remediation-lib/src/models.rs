//! Core data models for fault remediation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::quantity::MemoryQuantity;

/// Fault classification carried in the `status` field of an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    #[serde(rename = "OOMKilled")]
    OomKilled,
    CrashLoopBackOff,
    NodeNotReady,
}

impl FaultKind {
    pub const ALL: [FaultKind; 3] = [
        FaultKind::OomKilled,
        FaultKind::CrashLoopBackOff,
        FaultKind::NodeNotReady,
    ];

    /// Wire name as it appears in `detail.status`
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::OomKilled => "OOMKilled",
            FaultKind::CrashLoopBackOff => "CrashLoopBackOff",
            FaultKind::NodeNotReady => "NodeNotReady",
        }
    }

    /// Parse a wire name, returning `None` for unrecognized kinds
    pub fn from_status(status: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == status)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespaced pod (or workload) reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodRef {
    pub name: String,
    pub namespace: String,
}

impl PodRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Cluster-scoped node reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: String,
}

impl NodeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node/{}", self.name)
    }
}

/// A validated fault event. Construct through [`crate::event::parse_event`]
/// or directly when the caller already holds typed identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultEvent {
    OomKilled(PodRef),
    CrashLoopBackOff(PodRef),
    NodeNotReady(NodeRef),
}

impl FaultEvent {
    pub fn kind(&self) -> FaultKind {
        match self {
            FaultEvent::OomKilled(_) => FaultKind::OomKilled,
            FaultEvent::CrashLoopBackOff(_) => FaultKind::CrashLoopBackOff,
            FaultEvent::NodeNotReady(_) => FaultKind::NodeNotReady,
        }
    }

    /// Human-readable target, e.g. `prod/api-7` or `node/worker-3`
    pub fn target(&self) -> String {
        match self {
            FaultEvent::OomKilled(pod) | FaultEvent::CrashLoopBackOff(pod) => pod.to_string(),
            FaultEvent::NodeNotReady(node) => node.to_string(),
        }
    }

    /// Key used to serialize remediation of the same object
    pub fn lock_key(&self) -> String {
        match self {
            FaultEvent::OomKilled(pod) | FaultEvent::CrashLoopBackOff(pod) => {
                format!("pod/{}/{}", pod.namespace, pod.name)
            }
            FaultEvent::NodeNotReady(node) => format!("node/{}", node.name),
        }
    }
}

/// Memory limit as written on a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum DeclaredLimit {
    Unset,
    Quantity(MemoryQuantity),
    /// Text the quantity parser does not accept
    Unreadable(String),
}

impl DeclaredLimit {
    pub fn parse(text: &str) -> Self {
        match text.parse() {
            Ok(quantity) => DeclaredLimit::Quantity(quantity),
            Err(_) => DeclaredLimit::Unreadable(text.to_string()),
        }
    }
}

/// Snapshot of a workload's current spec as read from the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    pub name: String,
    pub namespace: String,
    /// Name of the first container in the pod template
    pub container: String,
    /// Memory limit of the first container
    pub memory_limit: DeclaredLimit,
    /// Optimistic concurrency token for conditional updates
    pub resource_version: Option<String>,
}

/// Pod state relevant to the crash-loop guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodState {
    pub name: String,
    pub namespace: String,
    /// Containers currently waiting with reason `CrashLoopBackOff`
    pub crash_looping_containers: Vec<String>,
}

impl PodState {
    pub fn is_crash_looping(&self) -> bool {
        !self.crash_looping_containers.is_empty()
    }
}

/// Node state relevant to the uncordon guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub name: String,
    pub unschedulable: bool,
    /// Status of the `Ready` condition (`True`, `False`, `Unknown`), if reported
    pub ready: Option<String>,
}

/// Mutation performed by a successful remediation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppliedChange {
    MemoryLimitRaised {
        container: String,
        /// Previous limit as written, which may not be a valid quantity
        from: String,
        to: MemoryQuantity,
    },
    PodDeleted {
        namespace: String,
        name: String,
    },
    NodeUncordoned {
        name: String,
    },
}

impl fmt::Display for AppliedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliedChange::MemoryLimitRaised {
                container,
                from,
                to,
            } => write!(f, "memory limit of {} {} -> {}", container, from, to),
            AppliedChange::PodDeleted { namespace, name } => {
                write!(f, "deleted pod {}/{}", namespace, name)
            }
            AppliedChange::NodeUncordoned { name } => write!(f, "uncordoned node {}", name),
        }
    }
}

/// Classification of the error behind a failed outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    Transport,
    Conflict,
    Timeout,
    /// The event was routed to an action that does not handle its kind
    Unsupported,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NotFound => "not_found",
            FailureReason::Transport => "transport",
            FailureReason::Conflict => "conflict",
            FailureReason::Timeout => "timeout",
            FailureReason::Unsupported => "unsupported",
        }
    }
}

/// Result of one remediation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    pub kind: FaultKind,
    pub target: String,
    pub succeeded: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_change: Option<AppliedChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl RemediationOutcome {
    pub fn applied(
        kind: FaultKind,
        target: impl Into<String>,
        message: impl Into<String>,
        change: AppliedChange,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            succeeded: true,
            message: message.into(),
            applied_change: Some(change),
            failure: None,
        }
    }

    /// Succeeded without mutating anything (guard found nothing to fix)
    pub fn skipped(kind: FaultKind, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            succeeded: true,
            message: message.into(),
            applied_change: None,
            failure: None,
        }
    }

    pub fn failed(
        kind: FaultKind,
        target: impl Into<String>,
        message: impl Into<String>,
        reason: FailureReason,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            succeeded: false,
            message: message.into(),
            applied_change: None,
            failure: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kind_wire_names() {
        assert_eq!(FaultKind::from_status("OOMKilled"), Some(FaultKind::OomKilled));
        assert_eq!(
            FaultKind::from_status("CrashLoopBackOff"),
            Some(FaultKind::CrashLoopBackOff)
        );
        assert_eq!(
            FaultKind::from_status("NodeNotReady"),
            Some(FaultKind::NodeNotReady)
        );
        assert_eq!(FaultKind::from_status("oomkilled"), None);
        assert_eq!(FaultKind::from_status("ImagePullBackOff"), None);
    }

    #[test]
    fn test_fault_kind_serializes_as_wire_name() {
        let json = serde_json::to_string(&FaultKind::OomKilled).unwrap();
        assert_eq!(json, "\"OOMKilled\"");
    }

    #[test]
    fn test_event_targets_and_lock_keys() {
        let oom = FaultEvent::OomKilled(PodRef::new("api-7", "prod"));
        assert_eq!(oom.target(), "prod/api-7");
        assert_eq!(oom.lock_key(), "pod/prod/api-7");

        let node = FaultEvent::NodeNotReady(NodeRef::new("worker-3"));
        assert_eq!(node.target(), "node/worker-3");
        assert_eq!(node.lock_key(), "node/worker-3");
        assert_eq!(node.kind(), FaultKind::NodeNotReady);
    }

    #[test]
    fn test_failed_outcome_serialization_omits_change() {
        let outcome = RemediationOutcome::failed(
            FaultKind::CrashLoopBackOff,
            "batch/worker-2",
            "Failed to restart pod worker-2: connection refused",
            FailureReason::Transport,
        );

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["succeeded"], false);
        assert_eq!(value["failure"], "transport");
        assert!(value.get("applied_change").is_none());
    }
}
