//! Approval orchestration.
//!
//! Lifecycle per approval id:
//!
//! ```text
//! CREATED ──► NOTIFIED ──► AWAITING ──► RESOLVED
//!                │
//!                └──► FAILED (send error, surfaced to the caller)
//! ```

use crate::await_decision::{AWAIT_DECISION_TASK, AwaitDecisionArgs, AwaitDecisionHandler};
use sanction_core::approval::{
    ApprovalId, ApprovalOutcome, ApprovalRequest, NotificationSink, WebhookRegistry,
};
use sanction_core::error::{Result, SanctionError};
use sanction_core::session::SessionId;
use sanction_core::task::TaskScheduler;
use std::sync::Arc;
use std::time::Duration;

/// How `request()` waits for the reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    /// Suspend until the decision arrives and return it
    Blocking,
    /// Return `pending` right after notifying; a scheduled task records the decision
    FireAndForget,
}

pub struct ApprovalOrchestrator {
    registry: Arc<dyn WebhookRegistry>,
    sink: Arc<dyn NotificationSink>,
    scheduler: Arc<dyn TaskScheduler>,
    awaiter: Arc<AwaitDecisionHandler>,
    deadline: Option<Duration>,
}

impl ApprovalOrchestrator {
    pub fn new(
        registry: Arc<dyn WebhookRegistry>,
        sink: Arc<dyn NotificationSink>,
        scheduler: Arc<dyn TaskScheduler>,
        awaiter: Arc<AwaitDecisionHandler>,
    ) -> Self {
        Self {
            registry,
            sink,
            scheduler,
            awaiter,
            deadline: None,
        }
    }

    /// Bounds the wait in blocking mode.
    ///
    /// Fire-and-forget tasks are never bounded.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Asks a human reviewer to decide on `request`.
    ///
    /// # Returns
    ///
    /// - `Ok(outcome)`: `pending` in fire-and-forget mode, the decision in blocking mode
    /// - `Err(SanctionError::Send)`: The notification sink failed; nothing was scheduled
    /// - `Err(_)`: Registration, scheduling or (blocking mode) recording failed
    pub async fn request(
        &self,
        session_id: &SessionId,
        request: ApprovalRequest,
        mode: ApprovalMode,
    ) -> Result<ApprovalOutcome> {
        let approval_id = ApprovalId::generate();
        let callback_address = self.registry.register(&approval_id).await?;
        tracing::info!(
            approval_id = %approval_id,
            session_id = %session_id,
            state = "CREATED",
            "approval created"
        );

        if let Err(e) = self
            .sink
            .send(&request, &approval_id, &callback_address)
            .await
        {
            tracing::warn!(
                approval_id = %approval_id,
                state = "FAILED",
                "notification failed: {}",
                e
            );
            self.release(&approval_id).await;
            return Err(if e.is_send() {
                e
            } else {
                SanctionError::send(e.to_string())
            });
        }
        tracing::info!(approval_id = %approval_id, state = "NOTIFIED", "reviewer notified");

        let args = AwaitDecisionArgs {
            approval_id: approval_id.clone(),
            session_id: session_id.clone(),
            request,
            callback_address,
        };

        match mode {
            ApprovalMode::Blocking => {
                let decision = self.awaiter.await_decision(&args, self.deadline).await?;
                Ok(ApprovalOutcome::resolved(approval_id, decision))
            }
            ApprovalMode::FireAndForget => {
                let task_args = serde_json::to_value(&args)?;
                match self.scheduler.schedule(AWAIT_DECISION_TASK, task_args).await {
                    Ok(handle) => {
                        tracing::debug!(
                            approval_id = %approval_id,
                            task_id = %handle.task_id,
                            "awaiting task scheduled"
                        );
                        Ok(ApprovalOutcome::pending(approval_id))
                    }
                    Err(e) => {
                        tracing::error!(approval_id = %approval_id, "failed to schedule awaiting task: {}", e);
                        self.release(&approval_id).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Drops the callback mapping of an approval that will never be awaited,
    /// so a late click is acknowledged as stale.
    async fn release(&self, approval_id: &ApprovalId) {
        if let Err(e) = self.registry.consume(approval_id).await {
            tracing::warn!(approval_id = %approval_id, "failed to release callback address: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        MemoryEndpoint, MemoryRegistry, MemoryResults, RecordingScheduler, RecordingSink,
        dragon_request,
    };
    use sanction_core::approval::{ApprovalResultRepository, Decision};
    use sanction_core::task::CallbackEndpoint;
    use std::time::Instant;

    struct Fixture {
        registry: Arc<MemoryRegistry>,
        results: Arc<MemoryResults>,
        endpoint: Arc<MemoryEndpoint>,
        sink: Arc<RecordingSink>,
        scheduler: Arc<RecordingScheduler>,
    }

    impl Fixture {
        fn new(sink: RecordingSink) -> Self {
            Self {
                registry: Arc::new(MemoryRegistry::default()),
                results: Arc::new(MemoryResults::default()),
                endpoint: Arc::new(MemoryEndpoint::default()),
                sink: Arc::new(sink),
                scheduler: Arc::new(RecordingScheduler::default()),
            }
        }

        fn orchestrator(&self) -> ApprovalOrchestrator {
            let awaiter = Arc::new(AwaitDecisionHandler::new(
                self.endpoint.clone(),
                self.results.clone(),
                self.registry.clone(),
            ));
            ApprovalOrchestrator::new(
                self.registry.clone(),
                self.sink.clone(),
                self.scheduler.clone(),
                awaiter,
            )
        }
    }

    #[tokio::test]
    async fn test_fire_and_forget_returns_pending_immediately() {
        let f = Fixture::new(RecordingSink::default());
        let session = SessionId::generate();

        let started = Instant::now();
        let outcome = f
            .orchestrator()
            .request(&session, dragon_request(), ApprovalMode::FireAndForget)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(outcome.pending);
        assert!(!outcome.approved);
        assert_eq!(outcome.response, "pending");

        let scheduled = f.scheduler.scheduled.lock().unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0, AWAIT_DECISION_TASK);
        let args: AwaitDecisionArgs = serde_json::from_value(scheduled[0].1.clone()).unwrap();
        assert_eq!(args.approval_id, outcome.approval_id);
        assert_eq!(args.session_id, session);
        assert_eq!(args.request, dragon_request());
    }

    #[tokio::test]
    async fn test_sink_receives_id_and_registered_address() {
        let f = Fixture::new(RecordingSink::default());
        let outcome = f
            .orchestrator()
            .request(&SessionId::generate(), dragon_request(), ApprovalMode::FireAndForget)
            .await
            .unwrap();

        let sent = f.sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, outcome.approval_id);
        assert_eq!(
            f.registry.resolve(&outcome.approval_id).await.unwrap(),
            Some(sent[0].2.clone())
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_surfaced_and_nothing_is_scheduled() {
        let f = Fixture::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let session = SessionId::generate();

        let err = f
            .orchestrator()
            .request(&session, dragon_request(), ApprovalMode::FireAndForget)
            .await
            .unwrap_err();

        assert!(err.is_send());
        assert!(f.scheduler.scheduled.lock().unwrap().is_empty());
        assert!(f.results.for_session(&session).await.unwrap().is_empty());
        assert!(f.registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blocking_mode_returns_decision() {
        let f = Fixture::new(RecordingSink::default());
        let session = SessionId::generate();
        let orchestrator = f.orchestrator();

        let sink = f.sink.clone();
        let endpoint = f.endpoint.clone();
        let reviewer = tokio::spawn(async move {
            // Click as soon as the message shows up
            loop {
                let address = sink.sent.lock().unwrap().first().map(|s| s.2.clone());
                if let Some(address) = address {
                    endpoint
                        .deliver(&address, Decision::deny("Denied"))
                        .await
                        .unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let outcome = orchestrator
            .request(&session, dragon_request(), ApprovalMode::Blocking)
            .await
            .unwrap();
        reviewer.await.unwrap();

        assert!(!outcome.pending);
        assert!(!outcome.approved);
        assert_eq!(outcome.response, "Denied");
        assert!(f.scheduler.scheduled.lock().unwrap().is_empty());
        assert_eq!(f.results.for_session(&session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blocking_mode_deadline() {
        let f = Fixture::new(RecordingSink::default());
        let orchestrator = f.orchestrator().with_deadline(Duration::from_millis(20));

        let outcome = orchestrator
            .request(&SessionId::generate(), dragon_request(), ApprovalMode::Blocking)
            .await
            .unwrap();

        assert!(!outcome.approved);
        assert_eq!(outcome.response, "Error: approval timed out");
    }
}
