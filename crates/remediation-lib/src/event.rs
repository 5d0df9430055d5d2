//! Inbound fault event parsing
//!
//! Events arrive as `{"detail": {"status": ..., "podName": ..., "namespace": ...}}`
//! or `{"detail": {"status": "NodeNotReady", "nodeName": ...}}`. Parsing
//! validates the kind and the identifiers that kind requires before anything
//! reaches the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{FaultEvent, FaultKind, NodeRef, PodRef};

/// Reasons an inbound event cannot be dispatched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event has no 'detail' object")]
    MissingDetail,

    #[error("event detail has no 'status'")]
    MissingStatus,

    #[error("unrecognized fault kind '{0}'")]
    UnknownKind(String),

    #[error("{kind} event is missing required field '{field}'")]
    MissingField { kind: FaultKind, field: &'static str },
}

impl EventError {
    /// True for structurally broken events, false for well-formed events of an
    /// unknown kind
    pub fn is_malformed(&self) -> bool {
        !matches!(self, EventError::UnknownKind(_))
    }
}

/// Wire shape of an inbound event, used by producers such as the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub detail: EventDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

impl From<&FaultEvent> for InboundEvent {
    fn from(event: &FaultEvent) -> Self {
        let status = Some(event.kind().as_str().to_string());
        let detail = match event {
            FaultEvent::OomKilled(pod) | FaultEvent::CrashLoopBackOff(pod) => EventDetail {
                status,
                pod_name: Some(pod.name.clone()),
                namespace: Some(pod.namespace.clone()),
                node_name: None,
            },
            FaultEvent::NodeNotReady(node) => EventDetail {
                status,
                pod_name: None,
                namespace: None,
                node_name: Some(node.name.clone()),
            },
        };
        Self { detail }
    }
}

/// Parse and validate a raw event payload
pub fn parse_event(payload: &Value) -> Result<FaultEvent, EventError> {
    let detail = payload
        .get("detail")
        .filter(|d| d.is_object())
        .ok_or(EventError::MissingDetail)?;

    let status = detail
        .get("status")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(EventError::MissingStatus)?;

    let kind =
        FaultKind::from_status(status).ok_or_else(|| EventError::UnknownKind(status.to_string()))?;

    match kind {
        FaultKind::OomKilled => Ok(FaultEvent::OomKilled(pod_ref(detail, kind)?)),
        FaultKind::CrashLoopBackOff => Ok(FaultEvent::CrashLoopBackOff(pod_ref(detail, kind)?)),
        FaultKind::NodeNotReady => {
            let name = required(detail, kind, "nodeName")?;
            Ok(FaultEvent::NodeNotReady(NodeRef::new(name)))
        }
    }
}

fn pod_ref(detail: &Value, kind: FaultKind) -> Result<PodRef, EventError> {
    let name = required(detail, kind, "podName")?;
    let namespace = required(detail, kind, "namespace")?;
    Ok(PodRef::new(name, namespace))
}

fn required<'a>(
    detail: &'a Value,
    kind: FaultKind,
    field: &'static str,
) -> Result<&'a str, EventError> {
    detail
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(EventError::MissingField { kind, field })
}
