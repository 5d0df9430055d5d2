//! Fault remediation library for Kubernetes workloads
//!
//! This crate provides the core functionality for:
//! - Parsing and validating inbound fault events
//! - Remediation actions (memory escalation, pod restart, node uncordon)
//! - Dispatching events with per-target serialization
//! - Cluster access through `kube`, with a dry-run wrapper
//! - Outcome notifications
//! - Health checks and observability

pub mod actions;
pub mod cluster;
pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod health;
pub mod models;
pub mod notify;
pub mod observability;
pub mod policy;
pub mod quantity;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cluster::{ClusterClient, ClusterError, DryRunClusterClient, KubeClusterClient};
pub use dispatcher::{DispatchResult, Dispatcher, RejectReason};
pub use event::{parse_event, EventError, InboundEvent};
pub use handler::{HandlerResponse, ResponseStatus};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use notify::{LogSink, NotificationSink, Notifier};
pub use observability::{RemediationMetrics, StructuredLogger};
pub use policy::{MemoryStepPolicy, RemediationConfig};
pub use quantity::MemoryQuantity;
