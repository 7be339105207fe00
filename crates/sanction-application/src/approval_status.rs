//! Polling view: what has been decided for a session so far.

use chrono::{DateTime, Utc};
use sanction_core::approval::{ApprovalId, ApprovalResult, ApprovalResultRepository};
use sanction_core::error::Result;
use sanction_core::session::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One decided approval as shown to the conversational layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSummary {
    pub approval_id: ApprovalId,
    pub approved: bool,
    pub response: String,
    pub situation: String,
    pub requested_action: String,
    pub timestamp: DateTime<Utc>,
}

impl From<ApprovalResult> for ApprovalSummary {
    fn from(result: ApprovalResult) -> Self {
        Self {
            approval_id: result.approval_id,
            approved: result.approved,
            response: result.response,
            situation: result.request_details.situation,
            requested_action: result.request_details.requested_action,
            timestamp: result.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStatus {
    pub success: bool,
    pub has_results: bool,
    pub results: Vec<ApprovalSummary>,
}

pub struct ApprovalStatusService {
    results: Arc<dyn ApprovalResultRepository>,
}

impl ApprovalStatusService {
    pub fn new(results: Arc<dyn ApprovalResultRepository>) -> Self {
        Self { results }
    }

    /// Lists every live result for `session_id`, oldest first.
    ///
    /// A malformed session id is a validation error.
    pub async fn check(&self, session_id: &str) -> Result<ApprovalStatus> {
        let session_id = SessionId::parse(session_id)?;
        self.check_session(&session_id).await
    }

    pub async fn check_session(&self, session_id: &SessionId) -> Result<ApprovalStatus> {
        let mut results: Vec<ApprovalSummary> = self
            .results
            .for_session(session_id)
            .await?
            .into_iter()
            .map(ApprovalSummary::from)
            .collect();
        results.sort_by_key(|r| r.timestamp);

        tracing::debug!(session_id = %session_id, count = results.len(), "checked approvals");
        Ok(ApprovalStatus {
            success: true,
            has_results: !results.is_empty(),
            results,
        })
    }
}
