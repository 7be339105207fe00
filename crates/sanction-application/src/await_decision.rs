//! The awaiting half of an approval: block on the callback address, then
//! record the decision.
//!
//! Runs either inline (blocking mode) or as a journaled long-lived task
//! (fire-and-forget mode). Everything it needs travels in
//! `AwaitDecisionArgs`, so a restarted process can resume it.

use async_trait::async_trait;
use sanction_core::approval::{
    ApprovalId, ApprovalRequest, ApprovalResultRepository, CallbackAddress, Decision,
    WebhookRegistry,
};
use sanction_core::error::Result;
use sanction_core::session::SessionId;
use sanction_core::task::{CallbackEndpoint, TaskHandler};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Task kind under which the awaiting handler is registered.
pub const AWAIT_DECISION_TASK: &str = "await_decision";

/// Serialized arguments of an awaiting task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitDecisionArgs {
    pub approval_id: ApprovalId,
    pub session_id: SessionId,
    pub request: ApprovalRequest,
    pub callback_address: CallbackAddress,
}

/// How often a waiting task checks that its callback address is still live.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_secs(60);

pub struct AwaitDecisionHandler {
    endpoint: Arc<dyn CallbackEndpoint>,
    results: Arc<dyn ApprovalResultRepository>,
    registry: Arc<dyn WebhookRegistry>,
    liveness_interval: Duration,
}

impl AwaitDecisionHandler {
    pub fn new(
        endpoint: Arc<dyn CallbackEndpoint>,
        results: Arc<dyn ApprovalResultRepository>,
        registry: Arc<dyn WebhookRegistry>,
    ) -> Self {
        Self {
            endpoint,
            results,
            registry,
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
        }
    }

    /// Overrides how often the registry mapping is re-checked while waiting.
    pub fn with_liveness_interval(mut self, interval: Duration) -> Self {
        self.liveness_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Waits for the decision and stores it.
    ///
    /// On failure a synthetic `approved=false, "Error: <cause>"` result is
    /// written before the error is returned, so pollers always see an outcome.
    ///
    /// # Arguments
    ///
    /// * `args` - Approval being awaited
    /// * `deadline` - Optional bound on the wait; `None` waits indefinitely
    pub async fn await_decision(
        &self,
        args: &AwaitDecisionArgs,
        deadline: Option<Duration>,
    ) -> Result<Decision> {
        match self.resolve(args, deadline).await {
            Ok(decision) => Ok(decision),
            Err(e) => {
                let synthetic = Decision::error(&e);
                tracing::error!(
                    approval_id = %args.approval_id,
                    session_id = %args.session_id,
                    state = "FAILED",
                    "awaiting approval failed: {}",
                    e
                );
                if let Err(record_err) = self
                    .results
                    .record(&args.session_id, &args.approval_id, &synthetic, &args.request)
                    .await
                {
                    tracing::error!(
                        approval_id = %args.approval_id,
                        "failed to store synthetic failure result: {}",
                        record_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn resolve(&self, args: &AwaitDecisionArgs, deadline: Option<Duration>) -> Result<Decision> {
        // A resumed task whose decision was stored by an earlier run
        if let Some(done) = self.stored_decision(args).await? {
            return Ok(done);
        }

        tracing::info!(
            approval_id = %args.approval_id,
            session_id = %args.session_id,
            state = "AWAITING",
            "waiting for reviewer decision"
        );

        let wait = self.wait_while_registered(args);
        let decision = match deadline {
            None => wait.await?,
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(decision) => decision?,
                Err(_) => {
                    tracing::warn!(
                        approval_id = %args.approval_id,
                        deadline_secs = limit.as_secs_f64(),
                        "approval deadline elapsed"
                    );
                    Waited::Decided(Decision::error("approval timed out"))
                }
            },
        };

        let decision = match decision {
            Waited::Decided(decision) => decision,
            Waited::AlreadyStored(decision) => return Ok(decision),
        };

        self.results
            .record(&args.session_id, &args.approval_id, &decision, &args.request)
            .await?;

        // The result is already durable; a failed consume only leaves a
        // mapping behind until its TTL runs out.
        if let Err(e) = self.registry.consume(&args.approval_id).await {
            tracing::warn!(approval_id = %args.approval_id, "failed to consume callback address: {}", e);
        }

        tracing::info!(
            approval_id = %args.approval_id,
            session_id = %args.session_id,
            approved = decision.approved,
            state = "RESOLVED",
            "approval resolved"
        );
        Ok(decision)
    }

    async fn stored_decision(&self, args: &AwaitDecisionArgs) -> Result<Option<Decision>> {
        let stored = self
            .results
            .for_approval(&args.session_id, &args.approval_id)
            .await?;
        if stored.is_some() {
            tracing::debug!(approval_id = %args.approval_id, "decision already stored");
        }
        Ok(stored.map(|r| r.decision()))
    }

    /// Waits on the callback address while its registry mapping lives.
    ///
    /// Once the mapping is gone (expired, deleted or consumed elsewhere) no
    /// click can reach this address, so the wait settles as expired unless a
    /// decision was stored in the meantime.
    async fn wait_while_registered(&self, args: &AwaitDecisionArgs) -> Result<Waited> {
        let wait = self.endpoint.wait(&args.callback_address);
        tokio::pin!(wait);
        let mut ticker = tokio::time::interval(self.liveness_interval);

        loop {
            tokio::select! {
                biased;
                decision = &mut wait => return decision.map(Waited::Decided),
                _ = ticker.tick() => {
                    if self.registry.resolve(&args.approval_id).await?.is_some() {
                        continue;
                    }
                    if let Some(done) = self.stored_decision(args).await? {
                        return Ok(Waited::AlreadyStored(done));
                    }
                    tracing::warn!(
                        approval_id = %args.approval_id,
                        "callback address no longer registered, settling as expired"
                    );
                    return Ok(Waited::Decided(Decision::error("approval expired")));
                }
            }
        }
    }
}

enum Waited {
    Decided(Decision),
    /// Recorded by another run; nothing left to write
    AlreadyStored(Decision),
}

#[async_trait]
impl TaskHandler for AwaitDecisionHandler {
    fn kind(&self) -> &'static str {
        AWAIT_DECISION_TASK
    }

    async fn run(&self, args: Value) -> Result<()> {
        let args: AwaitDecisionArgs = serde_json::from_value(args)?;
        self.await_decision(&args, None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryEndpoint, MemoryRegistry, MemoryResults, dragon_request};

    struct Fixture {
        endpoint: Arc<MemoryEndpoint>,
        results: Arc<MemoryResults>,
        registry: Arc<MemoryRegistry>,
        handler: Arc<AwaitDecisionHandler>,
    }

    fn fixture(results: MemoryResults) -> Fixture {
        let endpoint = Arc::new(MemoryEndpoint::default());
        let results = Arc::new(results);
        let registry = Arc::new(MemoryRegistry::default());
        let handler = Arc::new(AwaitDecisionHandler::new(
            endpoint.clone(),
            results.clone(),
            registry.clone(),
        ));
        Fixture {
            endpoint,
            results,
            registry,
            handler,
        }
    }

    async fn registered_args(registry: &MemoryRegistry) -> AwaitDecisionArgs {
        let approval_id = ApprovalId::generate();
        let callback_address = registry.register(&approval_id).await.unwrap();
        AwaitDecisionArgs {
            approval_id,
            session_id: SessionId::generate(),
            request: dragon_request(),
            callback_address,
        }
    }

    #[tokio::test]
    async fn test_decision_is_recorded_and_address_consumed() {
        let f = fixture(MemoryResults::default());
        let args = registered_args(&f.registry).await;

        let handler = f.handler.clone();
        let task_args = serde_json::to_value(&args).unwrap();
        let task = tokio::spawn(async move { handler.run(task_args).await });

        f.endpoint
            .deliver(&args.callback_address, Decision::approve("Approved"))
            .await
            .unwrap();
        task.await.unwrap().unwrap();

        let stored = f
            .results
            .for_approval(&args.session_id, &args.approval_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.approved);
        assert_eq!(stored.request_details, dragon_request());
        assert!(f.registry.resolve(&args.approval_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_writes_synthetic_result() {
        let f = fixture(MemoryResults::failing(1));
        let args = registered_args(&f.registry).await;

        f.endpoint
            .deliver(&args.callback_address, Decision::approve("Approved"))
            .await
            .unwrap();
        let err = f.handler.await_decision(&args, None).await.unwrap_err();
        assert!(err.is_storage());

        let stored = f
            .results
            .for_approval(&args.session_id, &args.approval_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.approved);
        assert!(stored.response.starts_with("Error: "));
        assert!(stored.response.contains("disk full"));
    }

    #[tokio::test]
    async fn test_deadline_yields_timed_out_decision() {
        let f = fixture(MemoryResults::default());
        let args = registered_args(&f.registry).await;

        let decision = f
            .handler
            .await_decision(&args, Some(Duration::from_millis(20)))
            .await
            .unwrap();

        assert_eq!(decision, Decision::error("approval timed out"));
        let stored = f.results.for_session(&args.session_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].response, "Error: approval timed out");
        assert!(f.registry.resolve(&args.approval_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_address_settles_as_expired() {
        let f = fixture(MemoryResults::default());
        let args = registered_args(&f.registry).await;
        f.registry.consume(&args.approval_id).await.unwrap();

        let decision = tokio::time::timeout(
            Duration::from_secs(5),
            f.handler.await_decision(&args, None),
        )
        .await
        .expect("wait should settle")
        .unwrap();

        assert_eq!(decision, Decision::error("approval expired"));
        let stored = f.results.for_session(&args.session_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].approved);
        assert_eq!(stored[0].response, "Error: approval expired");
    }

    #[tokio::test]
    async fn test_mapping_removed_mid_wait_settles() {
        let endpoint = Arc::new(MemoryEndpoint::default());
        let results = Arc::new(MemoryResults::default());
        let registry = Arc::new(MemoryRegistry::default());
        let handler = Arc::new(
            AwaitDecisionHandler::new(endpoint.clone(), results.clone(), registry.clone())
                .with_liveness_interval(Duration::from_millis(10)),
        );
        let args = registered_args(&registry).await;

        let task = {
            let handler = handler.clone();
            let args = args.clone();
            tokio::spawn(async move { handler.await_decision(&args, None).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        registry.consume(&args.approval_id).await.unwrap();

        let decision = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("wait should settle")
            .unwrap()
            .unwrap();
        assert_eq!(decision.response, "Error: approval expired");
    }

    #[tokio::test]
    async fn test_stored_decision_is_not_overwritten() {
        let f = fixture(MemoryResults::default());
        let args = registered_args(&f.registry).await;
        f.results
            .record(
                &args.session_id,
                &args.approval_id,
                &Decision::approve("Approved"),
                &args.request,
            )
            .await
            .unwrap();
        f.registry.consume(&args.approval_id).await.unwrap();

        let decision = f.handler.await_decision(&args, None).await.unwrap();

        assert!(decision.approved);
        let stored = f.results.for_session(&args.session_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].response, "Approved");
    }

    #[tokio::test]
    async fn test_malformed_args_are_rejected() {
        let f = fixture(MemoryResults::default());
        let err = f
            .handler
            .run(serde_json::json!({ "approvalId": "nope" }))
            .await
            .unwrap_err();
        assert!(matches!(err, sanction_core::SanctionError::Serialization { .. }));
    }
}
