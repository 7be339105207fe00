//! In-memory doubles for the core seams, shared by the use case tests.

use async_trait::async_trait;
use sanction_core::approval::{
    ApprovalId, ApprovalRequest, ApprovalResult, ApprovalResultRepository, CallbackAddress,
    Decision, NotificationSink, WebhookRecord, WebhookRegistry,
};
use sanction_core::error::{Result, SanctionError};
use sanction_core::session::SessionId;
use sanction_core::store::SweepReport;
use sanction_core::task::{CallbackEndpoint, TaskHandle, TaskScheduler};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

pub fn dragon_request() -> ApprovalRequest {
    ApprovalRequest {
        situation: "wants a dragon".to_string(),
        context: String::new(),
        reason: String::new(),
        requested_action: "approve dragon".to_string(),
    }
}

#[derive(Default)]
struct Channel {
    tx: Option<oneshot::Sender<Decision>>,
    rx: Option<oneshot::Receiver<Decision>>,
}

/// Callback endpoint with mailbox semantics: a delivery before `wait`
/// is buffered, a second delivery is stale.
#[derive(Default)]
pub struct MemoryEndpoint {
    channels: Mutex<HashMap<String, Channel>>,
    struck: Mutex<HashSet<String>>,
}

impl MemoryEndpoint {
    fn with_channel<R>(&self, token: &str, f: impl FnOnce(&mut Channel) -> R) -> R {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(token.to_string()).or_insert_with(|| {
            let (tx, rx) = oneshot::channel();
            Channel {
                tx: Some(tx),
                rx: Some(rx),
            }
        });
        f(channel)
    }
}

#[async_trait]
impl CallbackEndpoint for MemoryEndpoint {
    fn allocate(&self, approval_id: &ApprovalId) -> CallbackAddress {
        CallbackAddress::new("https://hooks.test", format!("{}-tok", approval_id))
    }

    async fn wait(&self, address: &CallbackAddress) -> Result<Decision> {
        let rx = self
            .with_channel(&address.token, |c| c.rx.take())
            .ok_or_else(|| SanctionError::internal("already waiting"))?;
        rx.await
            .map_err(|_| SanctionError::internal("endpoint dropped"))
    }

    async fn deliver(&self, address: &CallbackAddress, decision: Decision) -> Result<()> {
        if !self.struck.lock().unwrap().insert(address.token.clone()) {
            return Err(SanctionError::stale(address.token.clone()));
        }
        let tx = self.with_channel(&address.token, |c| c.tx.take());
        match tx {
            Some(tx) => tx
                .send(decision)
                .map_err(|_| SanctionError::stale(address.token.clone())),
            None => Err(SanctionError::stale(address.token.clone())),
        }
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    records: Mutex<HashMap<ApprovalId, WebhookRecord>>,
}

#[async_trait]
impl WebhookRegistry for MemoryRegistry {
    async fn register(&self, approval_id: &ApprovalId) -> Result<CallbackAddress> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(approval_id) {
            return Err(SanctionError::DuplicateRegistration {
                approval_id: approval_id.to_string(),
            });
        }
        let address = MemoryEndpoint::default().allocate(approval_id);
        records.insert(
            approval_id.clone(),
            WebhookRecord {
                approval_id: approval_id.clone(),
                callback_address: address.clone(),
                timestamp: chrono::Utc::now(),
            },
        );
        Ok(address)
    }

    async fn resolve(&self, approval_id: &ApprovalId) -> Result<Option<CallbackAddress>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(approval_id)
            .map(|r| r.callback_address.clone()))
    }

    async fn consume(&self, approval_id: &ApprovalId) -> Result<()> {
        self.records.lock().unwrap().remove(approval_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WebhookRecord>> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn sweep(&self) -> Result<SweepReport> {
        Ok(SweepReport::default())
    }
}

/// Result store whose next `fail_writes` writes fail with a storage error.
#[derive(Default)]
pub struct MemoryResults {
    results: Mutex<HashMap<(SessionId, ApprovalId), ApprovalResult>>,
    pub fail_writes: AtomicUsize,
}

impl MemoryResults {
    pub fn failing(writes: usize) -> Self {
        Self {
            fail_writes: AtomicUsize::new(writes),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ApprovalResultRepository for MemoryResults {
    async fn record(
        &self,
        session_id: &SessionId,
        approval_id: &ApprovalId,
        decision: &Decision,
        request: &ApprovalRequest,
    ) -> Result<ApprovalResult> {
        let failing = self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SanctionError::storage("disk full"));
        }
        let result = ApprovalResult::new(session_id.clone(), approval_id.clone(), decision, request);
        self.results
            .lock()
            .unwrap()
            .insert((session_id.clone(), approval_id.clone()), result.clone());
        Ok(result)
    }

    async fn for_session(&self, session_id: &SessionId) -> Result<Vec<ApprovalResult>> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn for_approval(
        &self,
        session_id: &SessionId,
        approval_id: &ApprovalId,
    ) -> Result<Option<ApprovalResult>> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(&(session_id.clone(), approval_id.clone()))
            .cloned())
    }

    async fn sweep(&self) -> Result<SweepReport> {
        Ok(SweepReport::default())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(ApprovalRequest, ApprovalId, CallbackAddress)>>,
    pub fail: bool,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(
        &self,
        request: &ApprovalRequest,
        approval_id: &ApprovalId,
        callback_address: &CallbackAddress,
    ) -> Result<()> {
        if self.fail {
            return Err(SanctionError::send("channel_not_found"));
        }
        self.sent.lock().unwrap().push((
            request.clone(),
            approval_id.clone(),
            callback_address.clone(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingScheduler {
    pub scheduled: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl TaskScheduler for RecordingScheduler {
    async fn schedule(&self, kind: &str, args: Value) -> Result<TaskHandle> {
        let mut scheduled = self.scheduled.lock().unwrap();
        scheduled.push((kind.to_string(), args));
        Ok(TaskHandle {
            task_id: format!("task-{}", scheduled.len()),
            kind: kind.to_string(),
        })
    }
}
