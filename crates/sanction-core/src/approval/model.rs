//! Approval domain model.

use crate::error::{Result, SanctionError};
use crate::session::{SessionId, generate_token, is_token};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const APPROVAL_PREFIX: &str = "approval";

/// Correlation token for one human-approval round trip.
///
/// Format: `approval_<millis>_<16 hex>`. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(String);

impl ApprovalId {
    pub fn generate() -> Self {
        Self(generate_token(APPROVAL_PREFIX))
    }

    pub fn is_valid(candidate: &str) -> bool {
        is_token(APPROVAL_PREFIX, candidate)
    }

    /// Parses an approval id received from outside (e.g. a button payload).
    pub fn parse(candidate: &str) -> Result<Self> {
        if Self::is_valid(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(SanctionError::validation(format!(
                "malformed approval id '{}'",
                candidate
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the caller wants a human to decide on.
///
/// Carried unchanged from creation through to the stored result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// Description of the situation requiring approval
    pub situation: String,
    /// Relevant context (order numbers, amounts, customer info, etc.)
    pub context: String,
    /// Why human approval is needed
    pub reason: String,
    /// The action to take if approved
    pub requested_action: String,
}

/// The reviewer's answer, as posted to a callback address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub approved: bool,
    pub response: String,
}

impl Decision {
    pub fn approve(response: impl Into<String>) -> Self {
        Self {
            approved: true,
            response: response.into(),
        }
    }

    pub fn deny(response: impl Into<String>) -> Self {
        Self {
            approved: false,
            response: response.into(),
        }
    }

    /// Synthetic decision written when the awaiting task fails.
    pub fn error(cause: impl fmt::Display) -> Self {
        Self {
            approved: false,
            response: format!("Error: {}", cause),
        }
    }
}

/// A single-use callback endpoint bound to one approval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallbackAddress {
    /// Network-reachable URL the notification sink posts the decision to
    pub url: String,
    /// Opaque token identifying the address (last path segment of `url`)
    pub token: String,
}

impl CallbackAddress {
    /// Builds `<base_url>/callbacks/<token>`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            url: format!("{}/callbacks/{}", base_url.trim_end_matches('/'), token),
            token,
        }
    }
}

/// Persisted approval → callback address mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRecord {
    pub approval_id: ApprovalId,
    pub callback_address: CallbackAddress,
    pub timestamp: DateTime<Utc>,
}

/// Persisted decision, partitioned by session.
///
/// Created exactly once per approval and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResult {
    pub approval_id: ApprovalId,
    pub session_id: SessionId,
    pub approved: bool,
    pub response: String,
    pub request_details: ApprovalRequest,
    pub timestamp: DateTime<Utc>,
}

impl ApprovalResult {
    pub fn new(
        session_id: SessionId,
        approval_id: ApprovalId,
        decision: &Decision,
        request: &ApprovalRequest,
    ) -> Self {
        Self {
            approval_id,
            session_id,
            approved: decision.approved,
            response: decision.response.clone(),
            request_details: request.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn decision(&self) -> Decision {
        Decision {
            approved: self.approved,
            response: self.response.clone(),
        }
    }
}

/// What `request()` hands back to the caller.
///
/// In fire-and-forget mode this is the `pending` marker; in blocking mode
/// it carries the reviewer's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub approval_id: ApprovalId,
    pub approved: bool,
    pub response: String,
    pub pending: bool,
}

impl ApprovalOutcome {
    pub fn pending(approval_id: ApprovalId) -> Self {
        Self {
            approval_id,
            approved: false,
            response: "pending".to_string(),
            pending: true,
        }
    }

    pub fn resolved(approval_id: ApprovalId, decision: Decision) -> Self {
        Self {
            approval_id,
            approved: decision.approved,
            response: decision.response,
            pending: false,
        }
    }
}
