//! Approval repository traits.
//!
//! Defines the two persisted partitions: the flat webhook registry and the
//! per-session approval result store.

use super::model::{
    ApprovalId, ApprovalRequest, ApprovalResult, CallbackAddress, Decision, WebhookRecord,
};
use crate::error::Result;
use crate::session::SessionId;
use crate::store::SweepReport;
use async_trait::async_trait;

/// Maps an approval id to its one-time callback address.
#[async_trait]
pub trait WebhookRegistry: Send + Sync {
    /// Allocates a fresh single-use address for `approval_id` and persists
    /// the mapping.
    ///
    /// # Returns
    ///
    /// - `Ok(CallbackAddress)`: Address allocated
    /// - `Err(SanctionError::DuplicateRegistration)`: A live mapping already exists
    /// - `Err(_)`: Storage failure
    async fn register(&self, approval_id: &ApprovalId) -> Result<CallbackAddress>;

    /// Looks up the live address for `approval_id`.
    ///
    /// Expired mappings are evicted and reported as `Ok(None)`.
    async fn resolve(&self, approval_id: &ApprovalId) -> Result<Option<CallbackAddress>>;

    /// Deletes the mapping after the first successful delivery.
    ///
    /// Not an error if the mapping is already gone.
    async fn consume(&self, approval_id: &ApprovalId) -> Result<()>;

    /// Lists every live mapping.
    async fn list(&self) -> Result<Vec<WebhookRecord>>;

    /// Evicts expired mappings.
    async fn sweep(&self) -> Result<SweepReport>;
}

/// Stores decisions keyed by (session, approval).
#[async_trait]
pub trait ApprovalResultRepository: Send + Sync {
    /// Writes an approval result. A second call for the same approval
    /// overwrites the first.
    async fn record(
        &self,
        session_id: &SessionId,
        approval_id: &ApprovalId,
        decision: &Decision,
        request: &ApprovalRequest,
    ) -> Result<ApprovalResult>;

    /// Returns every non-expired result for the session, in no particular order.
    async fn for_session(&self, session_id: &SessionId) -> Result<Vec<ApprovalResult>>;

    /// Returns one result, if present and not expired.
    async fn for_approval(
        &self,
        session_id: &SessionId,
        approval_id: &ApprovalId,
    ) -> Result<Option<ApprovalResult>>;

    /// Evicts expired results and removes emptied session partitions.
    async fn sweep(&self) -> Result<SweepReport>;
}
