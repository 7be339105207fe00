//! Key-value backed `WebhookRegistry`.
//!
//! Flat key space keyed by approval id, TTL one hour by default.

use async_trait::async_trait;
use chrono::Utc;
use sanction_core::approval::{ApprovalId, CallbackAddress, WebhookRecord, WebhookRegistry};
use sanction_core::error::{Result, SanctionError};
use sanction_core::store::{KeyValueStore, SweepReport};
use sanction_core::task::CallbackEndpoint;
use std::sync::Arc;

pub struct KvWebhookRegistry {
    store: Arc<dyn KeyValueStore<WebhookRecord>>,
    endpoint: Arc<dyn CallbackEndpoint>,
}

impl KvWebhookRegistry {
    /// # Arguments
    ///
    /// * `store` - Flat store holding the approval → address mappings
    /// * `endpoint` - Allocator for fresh callback addresses
    pub fn new(
        store: Arc<dyn KeyValueStore<WebhookRecord>>,
        endpoint: Arc<dyn CallbackEndpoint>,
    ) -> Self {
        Self { store, endpoint }
    }
}

#[async_trait]
impl WebhookRegistry for KvWebhookRegistry {
    async fn register(&self, approval_id: &ApprovalId) -> Result<CallbackAddress> {
        let callback_address = self.endpoint.allocate(approval_id);
        let record = WebhookRecord {
            approval_id: approval_id.clone(),
            callback_address: callback_address.clone(),
            timestamp: Utc::now(),
        };

        match self
            .store
            .put_if_absent(None, approval_id.as_str(), &record)
            .await?
        {
            Some(_) => {
                tracing::debug!(approval_id = %approval_id, url = %callback_address.url, "registered callback address");
                Ok(callback_address)
            }
            None => {
                tracing::warn!(approval_id = %approval_id, "duplicate callback registration rejected");
                Err(SanctionError::DuplicateRegistration {
                    approval_id: approval_id.to_string(),
                })
            }
        }
    }

    async fn resolve(&self, approval_id: &ApprovalId) -> Result<Option<CallbackAddress>> {
        let entry = self.store.get(None, approval_id.as_str()).await?;
        tracing::debug!(approval_id = %approval_id, found = entry.is_some(), "resolved callback address");
        Ok(entry.map(|e| e.record.callback_address))
    }

    async fn consume(&self, approval_id: &ApprovalId) -> Result<()> {
        self.store.delete(None, approval_id.as_str()).await?;
        tracing::debug!(approval_id = %approval_id, "consumed callback address");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WebhookRecord>> {
        let entries = self.store.list(None).await?;
        Ok(entries.into_iter().map(|e| e.record).collect())
    }

    async fn sweep(&self) -> Result<SweepReport> {
        self.store.sweep().await
    }
}
