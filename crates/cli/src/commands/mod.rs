//! Subcommand implementations

pub mod health;
pub mod run;
pub mod send;

use anyhow::{Context, Result};
use clap::Args;
use remediation_lib::event::{EventDetail, InboundEvent};
use serde_json::Value;
use std::path::PathBuf;

/// Fault event given either as flags or as a JSON file
#[derive(Debug, Clone, Args)]
pub struct EventArgs {
    /// Fault kind (OOMKilled, CrashLoopBackOff, NodeNotReady)
    #[arg(long, short, required_unless_present = "file")]
    pub status: Option<String>,

    /// Pod (and workload) name for pod faults
    #[arg(long, short)]
    pub pod: Option<String>,

    /// Namespace for pod faults
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Node name for NodeNotReady
    #[arg(long)]
    pub node: Option<String>,

    /// Read the whole event from a JSON file instead
    #[arg(long, short, conflicts_with_all = ["status", "pod", "namespace", "node"])]
    pub file: Option<PathBuf>,
}

impl EventArgs {
    /// Build the raw event payload. No validation happens here; the
    /// dispatcher decides what is malformed.
    pub fn to_payload(&self) -> Result<Value> {
        if let Some(path) = &self.file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read event file {}", path.display()))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("Event file {} is not valid JSON", path.display()));
        }

        let event = InboundEvent {
            detail: EventDetail {
                status: self.status.clone(),
                pod_name: self.pod.clone(),
                namespace: self.namespace.clone(),
                node_name: self.node.clone(),
            },
        };
        serde_json::to_value(event).context("Failed to encode event")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(status: &str) -> EventArgs {
        EventArgs {
            status: Some(status.to_string()),
            pod: None,
            namespace: None,
            node: None,
            file: None,
        }
    }

    #[test]
    fn test_pod_event_from_flags() {
        let mut event = args("OOMKilled");
        event.pod = Some("api-7".to_string());
        event.namespace = Some("prod".to_string());

        assert_eq!(
            event.to_payload().unwrap(),
            json!({"detail": {"status": "OOMKilled", "podName": "api-7", "namespace": "prod"}})
        );
    }

    #[test]
    fn test_node_event_from_flags() {
        let mut event = args("NodeNotReady");
        event.node = Some("worker-3".to_string());

        assert_eq!(
            event.to_payload().unwrap(),
            json!({"detail": {"status": "NodeNotReady", "nodeName": "worker-3"}})
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let event = EventArgs {
            status: None,
            pod: None,
            namespace: None,
            node: None,
            file: Some(PathBuf::from("/nonexistent/event.json")),
        };
        assert!(event.to_payload().is_err());
    }
}
