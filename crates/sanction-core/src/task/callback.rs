use crate::approval::{ApprovalId, CallbackAddress, Decision};
use crate::error::Result;
use async_trait::async_trait;

/// Single-use callback addresses.
#[async_trait]
pub trait CallbackEndpoint: Send + Sync {
    /// Mints a fresh address for `approval_id`. Pure allocation, nothing is
    /// persisted here.
    fn allocate(&self, approval_id: &ApprovalId) -> CallbackAddress;

    /// Suspends until the first delivery to `address`.
    ///
    /// There is no timeout; an approval may stay pending indefinitely.
    async fn wait(&self, address: &CallbackAddress) -> Result<Decision>;

    /// Delivers a decision to `address`.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Accepted; a current or future `wait` receives it
    /// - `Err(SanctionError::StaleCallback)`: The address was already struck
    async fn deliver(&self, address: &CallbackAddress, decision: Decision) -> Result<()>;
}
