//! Health tracking for the remediation service
//!
//! Backs the liveness and readiness probes. Components are marked degraded
//! when their calls fail transiently and healthy again on the next success.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{FailureReason, RemediationOutcome};

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Failing intermittently but still serving
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Last known health of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn at(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::at(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::at(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::at(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components; healthy when there are none
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max_by_key(|status| match status {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReadinessResponse {
    fn not_ready(reason: &str) -> Self {
        Self {
            ready: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Component names for health tracking
pub mod components {
    pub const DISPATCHER: &str = "dispatcher";
    pub const CLUSTER_CLIENT: &str = "cluster_client";
    pub const NOTIFIER: &str = "notifier";
}

/// Shared component health table plus the readiness flag. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<AtomicBool>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components.write().await.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Fold a remediation outcome into the cluster client's health.
    ///
    /// Transport errors and timeouts point at the cluster connection;
    /// not-found and conflicts are about the target object and leave
    /// health untouched.
    pub async fn observe_outcome(&self, outcome: &RemediationOutcome) {
        match outcome.failure {
            None => self.set_healthy(components::CLUSTER_CLIENT).await,
            Some(FailureReason::Transport) | Some(FailureReason::Timeout) => {
                self.set_degraded(components::CLUSTER_CLIENT, outcome.message.clone())
                    .await
            }
            Some(_) => {}
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        HealthResponse {
            status: HealthResponse::compute_status(&components),
            components,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        if !self.ready.load(Ordering::SeqCst) {
            return ReadinessResponse::not_ready("Remediator not yet initialized");
        }
        match self.health().await.status {
            ComponentStatus::Unhealthy => {
                ReadinessResponse::not_ready("Critical component unhealthy")
            }
            _ => ReadinessResponse {
                ready: true,
                reason: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FaultKind;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_component_degrades_overall() {
        let registry = HealthRegistry::new();
        registry.register(components::DISPATCHER).await;
        registry.register(components::CLUSTER_CLIENT).await;

        registry
            .set_degraded(components::CLUSTER_CLIENT, "apiserver timeout")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.status.is_operational());
    }

    #[tokio::test]
    async fn test_transport_failure_degrades_cluster_client() {
        let registry = HealthRegistry::new();
        registry.register(components::CLUSTER_CLIENT).await;

        let failed = RemediationOutcome::failed(
            FaultKind::NodeNotReady,
            "node/worker-3",
            "Failed to uncordon node worker-3: connection refused",
            FailureReason::Transport,
        );
        registry.observe_outcome(&failed).await;
        let health = registry.health().await;
        assert_eq!(
            health.components[components::CLUSTER_CLIENT].status,
            ComponentStatus::Degraded
        );

        let recovered = RemediationOutcome::skipped(
            FaultKind::NodeNotReady,
            "node/worker-3",
            "Node worker-3 is already schedulable",
        );
        registry.observe_outcome(&recovered).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_not_found_leaves_health_alone() {
        let registry = HealthRegistry::new();
        registry.register(components::CLUSTER_CLIENT).await;

        let outcome = RemediationOutcome::failed(
            FaultKind::OomKilled,
            "prod/ghost",
            "Failed to get workload details for prod/ghost: deployment ghost not found",
            FailureReason::NotFound,
        );
        registry.observe_outcome(&outcome).await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness() {
        let registry = HealthRegistry::new();
        assert!(!registry.readiness().await.ready);

        registry.register(components::DISPATCHER).await;
        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        registry.set_unhealthy(components::DISPATCHER, "no actions").await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }
}
