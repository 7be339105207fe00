//! Key-value backed `ApprovalResultRepository`.
//!
//! One namespace per session, keyed by approval id, TTL 24 hours by default.

use async_trait::async_trait;
use sanction_core::approval::{
    ApprovalId, ApprovalRequest, ApprovalResult, ApprovalResultRepository, Decision,
};
use sanction_core::error::Result;
use sanction_core::session::SessionId;
use sanction_core::store::{KeyValueStore, SweepReport};
use std::sync::Arc;

pub struct KvApprovalResultRepository {
    store: Arc<dyn KeyValueStore<ApprovalResult>>,
}

impl KvApprovalResultRepository {
    pub fn new(store: Arc<dyn KeyValueStore<ApprovalResult>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ApprovalResultRepository for KvApprovalResultRepository {
    async fn record(
        &self,
        session_id: &SessionId,
        approval_id: &ApprovalId,
        decision: &Decision,
        request: &ApprovalRequest,
    ) -> Result<ApprovalResult> {
        let result = ApprovalResult::new(session_id.clone(), approval_id.clone(), decision, request);
        self.store
            .put(Some(session_id.as_str()), approval_id.as_str(), &result)
            .await?;

        tracing::info!(
            session_id = %session_id,
            approval_id = %approval_id,
            approved = decision.approved,
            "stored approval result"
        );
        Ok(result)
    }

    async fn for_session(&self, session_id: &SessionId) -> Result<Vec<ApprovalResult>> {
        let entries = self.store.list(Some(session_id.as_str())).await?;
        tracing::debug!(session_id = %session_id, count = entries.len(), "loaded approval results");
        Ok(entries.into_iter().map(|e| e.record).collect())
    }

    async fn for_approval(
        &self,
        session_id: &SessionId,
        approval_id: &ApprovalId,
    ) -> Result<Option<ApprovalResult>> {
        let entry = self
            .store
            .get(Some(session_id.as_str()), approval_id.as_str())
            .await?;
        Ok(entry.map(|e| e.record))
    }

    async fn sweep(&self) -> Result<SweepReport> {
        self.store.sweep().await
    }
}
