//! Notification sink trait.

use super::model::{ApprovalId, ApprovalRequest, CallbackAddress};
use crate::error::Result;
use async_trait::async_trait;

/// The external channel that presents a request to a human.
///
/// Implementations must round-trip `approval_id` into whatever payload the
/// reviewer's action later produces; it is the only correlation mechanism.
/// A single best-effort attempt is made; failures are reported as
/// `SanctionError::Send` and never retried.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        request: &ApprovalRequest,
        approval_id: &ApprovalId,
        callback_address: &CallbackAddress,
    ) -> Result<()>;
}
