//! Remediation policy: memory escalation ladder and action settings

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::cluster::DEFAULT_CLUSTER_TIMEOUT;
use crate::quantity::MemoryQuantity;

/// Errors in a remediation policy definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("ladder step {from} appears more than once")]
    DuplicateStep { from: String },

    #[error("ladder step {from} -> {to} does not raise the limit")]
    NonIncreasingStep { from: String, to: String },

    #[error("cluster_timeout_secs must be greater than zero")]
    ZeroClusterTimeout,
}

/// One rung of the escalation ladder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderStep {
    pub from: MemoryQuantity,
    pub to: MemoryQuantity,
}

/// Maps a current memory limit to the next one.
///
/// A current limit equal to some step's `from` moves to that step's `to`;
/// anything else moves to `fallback`. The default ladder is
/// `512Mi -> 1Gi`, everything else `-> 2Gi`. It is a fixed table, not a
/// doubling rule: `2Gi` stays at `2Gi` and larger limits are brought to `2Gi`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStepPolicy {
    #[serde(default = "default_steps")]
    pub steps: Vec<LadderStep>,
    #[serde(default = "default_fallback")]
    pub fallback: MemoryQuantity,
}

fn default_steps() -> Vec<LadderStep> {
    vec![LadderStep {
        from: MemoryQuantity::mebibytes(512),
        to: MemoryQuantity::gibibytes(1),
    }]
}

fn default_fallback() -> MemoryQuantity {
    MemoryQuantity::gibibytes(2)
}

impl Default for MemoryStepPolicy {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            fallback: default_fallback(),
        }
    }
}

impl MemoryStepPolicy {
    pub fn new(steps: Vec<LadderStep>, fallback: MemoryQuantity) -> Result<Self, ConfigError> {
        let policy = Self { steps, fallback };
        policy.validate()?;
        Ok(policy)
    }

    /// Next limit for `current`
    pub fn next(&self, current: &MemoryQuantity) -> MemoryQuantity {
        self.steps
            .iter()
            .find(|step| step.from == *current)
            .map(|step| step.to.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Reject tables with ambiguous or non-escalating steps
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, step) in self.steps.iter().enumerate() {
            if step.to <= step.from {
                return Err(ConfigError::NonIncreasingStep {
                    from: step.from.to_string(),
                    to: step.to.to_string(),
                });
            }
            if self.steps[..i].iter().any(|earlier| earlier.from == step.from) {
                return Err(ConfigError::DuplicateStep {
                    from: step.from.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Settings shared by the remediation actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationConfig {
    /// Limit assumed when the workload declares none
    #[serde(default = "default_memory_limit")]
    pub default_memory_limit: MemoryQuantity,

    #[serde(default)]
    pub ladder: MemoryStepPolicy,

    /// Re-fetch and retry attempts after a patch conflict
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,

    /// Opt-in: only delete pods that are still crash-looping
    #[serde(default)]
    pub guard_pod_state: bool,

    /// Opt-in: only uncordon nodes that are still cordoned
    #[serde(default)]
    pub guard_node_state: bool,

    /// Upper bound on each cluster call
    #[serde(default = "default_cluster_timeout_secs")]
    pub cluster_timeout_secs: u64,
}

fn default_memory_limit() -> MemoryQuantity {
    MemoryQuantity::mebibytes(512)
}

fn default_conflict_retries() -> u32 {
    1
}

fn default_cluster_timeout_secs() -> u64 {
    DEFAULT_CLUSTER_TIMEOUT.as_secs()
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            default_memory_limit: default_memory_limit(),
            ladder: MemoryStepPolicy::default(),
            conflict_retries: default_conflict_retries(),
            guard_pod_state: false,
            guard_node_state: false,
            cluster_timeout_secs: default_cluster_timeout_secs(),
        }
    }
}

impl RemediationConfig {
    /// Read pod and node state before deleting or uncordoning
    pub fn guarded() -> Self {
        Self {
            guard_pod_state: true,
            guard_node_state: true,
            ..Self::default()
        }
    }

    pub fn cluster_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_timeout_secs == 0 {
            return Err(ConfigError::ZeroClusterTimeout);
        }
        self.ladder.validate()
    }
}
