//! Cluster control-plane access
//!
//! This module provides:
//! - The [`ClusterClient`] capability used by remediation actions
//! - A `kube`-backed implementation for real clusters
//! - A dry-run wrapper that reads for real and only logs mutations
//! - The timeout-bounded [`StateReader`] used for workload lookups

mod dry_run;
mod kube_client;
mod reader;

pub use dry_run::DryRunClusterClient;
pub use kube_client::KubeClusterClient;
pub use reader::{bounded, StateReader, DEFAULT_CLUSTER_TIMEOUT};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{FailureReason, NodeState, PodState, WorkloadDescriptor};
use crate::quantity::MemoryQuantity;

/// Errors returned by cluster client operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("cluster request failed: {0}")]
    Transport(String),

    #[error("update conflict: {0}")]
    Conflict(String),

    #[error("cluster request timed out after {0:?}")]
    Timeout(Duration),
}

impl ClusterError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ClusterError::NotFound { .. } => FailureReason::NotFound,
            ClusterError::Transport(_) => FailureReason::Transport,
            ClusterError::Conflict(_) => FailureReason::Conflict,
            ClusterError::Timeout(_) => FailureReason::Timeout,
        }
    }
}

/// Targeted update of one container's memory limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLimitPatch {
    pub name: String,
    pub namespace: String,
    pub container: String,
    pub limit: MemoryQuantity,
    /// When set, the update only succeeds if the object is still at this version
    pub resource_version: Option<String>,
}

/// Operations the remediation actions need from the orchestrator
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Read the workload's first container and its memory limit
    async fn get_workload(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<WorkloadDescriptor, ClusterError>;

    /// Replace exactly one container's memory limit, leaving the rest of the spec untouched
    async fn patch_memory_limit(&self, patch: &MemoryLimitPatch) -> Result<(), ClusterError>;

    async fn get_pod(&self, name: &str, namespace: &str) -> Result<PodState, ClusterError>;

    /// Delete a pod so its owning controller recreates it
    async fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), ClusterError>;

    async fn get_node(&self, name: &str) -> Result<NodeState, ClusterError>;

    /// Mark a node schedulable
    async fn uncordon_node(&self, name: &str) -> Result<(), ClusterError>;
}
