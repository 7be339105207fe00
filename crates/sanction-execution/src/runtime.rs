//! Composition root.
//!
//! Wires the file stores, the callback hub and the task runtime into the
//! application use cases. One `ApprovalRuntime` per process.

use crate::callback_hub::CallbackHub;
use crate::task_runtime::TaskRuntime;
use sanction_application::{
    ApprovalOrchestrator, ApprovalStatusService, AwaitDecisionHandler, CallbackIngress,
    StorageMaintenance,
};
use sanction_core::approval::{
    ApprovalResult, ApprovalResultRepository, NotificationSink, WebhookRecord, WebhookRegistry,
};
use sanction_core::config::SanctionConfig;
use sanction_core::error::Result;
use sanction_core::task::{CallbackEndpoint, TaskHandle, TaskRecord, TaskScheduler};
use sanction_infrastructure::{
    FileKvStore, KvApprovalResultRepository, KvWebhookRegistry, Partition, SanctionPaths,
};
use std::path::Path;
use std::sync::Arc;

pub struct ApprovalRuntime {
    config: SanctionConfig,
    hub: Arc<CallbackHub>,
    tasks: Arc<TaskRuntime>,
    registry: Arc<dyn WebhookRegistry>,
    results: Arc<dyn ApprovalResultRepository>,
    orchestrator: ApprovalOrchestrator,
    ingress: CallbackIngress,
    status: ApprovalStatusService,
    maintenance: Arc<StorageMaintenance>,
}

impl ApprovalRuntime {
    /// Builds the runtime, resolving the data directory from
    /// `storage.base_dir` or the platform default.
    pub fn from_config(config: SanctionConfig, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let mut paths = SanctionPaths::new(None);
        if let Some(base_dir) = &config.storage.base_dir {
            paths = paths.with_data_dir(base_dir);
        }
        let data_dir = paths.data_dir()?;
        Ok(Self::new(config, &data_dir, sink))
    }

    /// Builds the runtime over an explicit data directory.
    pub fn new(config: SanctionConfig, data_dir: &Path, sink: Arc<dyn NotificationSink>) -> Self {
        let partition = |p: Partition| data_dir.join(p.dir_name());
        let storage = &config.storage;

        let hub = Arc::new(CallbackHub::new(
            config.callback.public_base_url.clone(),
            storage.webhook_ttl(),
        ));
        let endpoint: Arc<dyn CallbackEndpoint> = hub.clone();

        let webhook_store: FileKvStore<WebhookRecord> =
            FileKvStore::new(partition(Partition::Webhooks), storage.webhook_ttl());
        let result_store: FileKvStore<ApprovalResult> =
            FileKvStore::new(partition(Partition::ApprovalResults), storage.result_ttl());
        let journal = Arc::new(FileKvStore::<TaskRecord>::new(
            partition(Partition::Tasks),
            storage.task_ttl(),
        ));

        let registry: Arc<dyn WebhookRegistry> = Arc::new(KvWebhookRegistry::new(
            Arc::new(webhook_store),
            endpoint.clone(),
        ));
        let results: Arc<dyn ApprovalResultRepository> =
            Arc::new(KvApprovalResultRepository::new(Arc::new(result_store)));

        let awaiter = Arc::new(AwaitDecisionHandler::new(
            endpoint.clone(),
            results.clone(),
            registry.clone(),
        ));
        let tasks = Arc::new(TaskRuntime::new(journal.clone()));
        tasks.register(awaiter.clone());
        let scheduler: Arc<dyn TaskScheduler> = tasks.clone();

        let orchestrator =
            ApprovalOrchestrator::new(registry.clone(), sink, scheduler, awaiter);
        let ingress = CallbackIngress::new(registry.clone(), endpoint);
        let status = ApprovalStatusService::new(results.clone());
        let maintenance = Arc::new(
            StorageMaintenance::new(results.clone(), registry.clone()).with_journal(journal),
        );

        tracing::debug!(data_dir = %data_dir.display(), "approval runtime assembled");

        Self {
            config,
            hub,
            tasks,
            registry,
            results,
            orchestrator,
            ingress,
            status,
            maintenance,
        }
    }

    /// Resumes journaled tasks and starts the maintenance scheduler.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) -> Result<Vec<TaskHandle>> {
        let resumed = self.tasks.resume_pending().await?;
        if !resumed.is_empty() {
            tracing::info!(count = resumed.len(), "resumed pending approvals");
        }
        self.maintenance.start_scheduler(&self.config.maintenance);
        Ok(resumed)
    }

    pub fn config(&self) -> &SanctionConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &ApprovalOrchestrator {
        &self.orchestrator
    }

    pub fn ingress(&self) -> &CallbackIngress {
        &self.ingress
    }

    pub fn status(&self) -> &ApprovalStatusService {
        &self.status
    }

    pub fn maintenance(&self) -> &Arc<StorageMaintenance> {
        &self.maintenance
    }

    pub fn hub(&self) -> &Arc<CallbackHub> {
        &self.hub
    }

    pub fn tasks(&self) -> &Arc<TaskRuntime> {
        &self.tasks
    }

    pub fn registry(&self) -> &Arc<dyn WebhookRegistry> {
        &self.registry
    }

    pub fn results(&self) -> &Arc<dyn ApprovalResultRepository> {
        &self.results
    }
}
