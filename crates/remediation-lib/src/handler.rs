//! Response envelope for the top-level event boundary

use serde::{Deserialize, Serialize};

use crate::dispatcher::{DispatchResult, RejectReason};
use crate::models::RemediationOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    RemediationExecuted,
    RemediationFailed,
    Rejected,
}

/// What the event boundary returns to its caller. `succeeded` mirrors the
/// outcome so a trigger can decide whether to retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub status: ResponseStatus,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RemediationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// `unknown_kind` or `malformed` for rejections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

impl HandlerResponse {
    pub fn rejected(reason: &RejectReason) -> Self {
        Self {
            status: ResponseStatus::Rejected,
            succeeded: false,
            outcome: None,
            reason: Some(reason.to_string()),
            rejection: Some(reason.as_str().to_string()),
        }
    }

    /// HTTP status code for this response
    pub fn http_status(&self) -> u16 {
        match (self.status, self.rejection.as_deref()) {
            (ResponseStatus::RemediationExecuted, _) => 200,
            (ResponseStatus::RemediationFailed, _) => 502,
            (ResponseStatus::Rejected, Some("unknown_kind")) => 422,
            (ResponseStatus::Rejected, _) => 400,
        }
    }
}

impl From<DispatchResult> for HandlerResponse {
    fn from(result: DispatchResult) -> Self {
        match result {
            DispatchResult::Handled(outcome) => Self {
                status: if outcome.succeeded {
                    ResponseStatus::RemediationExecuted
                } else {
                    ResponseStatus::RemediationFailed
                },
                succeeded: outcome.succeeded,
                reason: None,
                rejection: None,
                outcome: Some(outcome),
            },
            DispatchResult::Rejected(reason) => Self::rejected(&reason),
        }
    }
}
