//! Periodic TTL sweep over every persisted partition.
//!
//! Reads already evict lazily; the sweep only bounds the storage footprint
//! (records never read again, emptied session directories).

use sanction_core::approval::{ApprovalResultRepository, WebhookRegistry};
use sanction_core::config::MaintenanceConfig;
use sanction_core::error::Result;
use sanction_core::store::{KeyValueStore, SweepReport};
use sanction_core::task::TaskRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Per-partition sweep counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub results: SweepReport,
    pub webhooks: SweepReport,
    pub tasks: SweepReport,
}

impl MaintenanceReport {
    pub fn total(&self) -> SweepReport {
        self.results.merge(self.webhooks).merge(self.tasks)
    }
}

pub struct StorageMaintenance {
    results: Arc<dyn ApprovalResultRepository>,
    registry: Arc<dyn WebhookRegistry>,
    journal: Option<Arc<dyn KeyValueStore<TaskRecord>>>,
    scheduler_running: AtomicBool,
}

impl StorageMaintenance {
    pub fn new(
        results: Arc<dyn ApprovalResultRepository>,
        registry: Arc<dyn WebhookRegistry>,
    ) -> Self {
        Self {
            results,
            registry,
            journal: None,
            scheduler_running: AtomicBool::new(false),
        }
    }

    /// Includes the task journal in every sweep.
    pub fn with_journal(mut self, journal: Arc<dyn KeyValueStore<TaskRecord>>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub async fn sweep_all(&self) -> Result<MaintenanceReport> {
        let results = self.results.sweep().await?;
        let webhooks = self.registry.sweep().await?;
        let tasks = match &self.journal {
            Some(journal) => journal.sweep().await?,
            None => SweepReport::default(),
        };

        let report = MaintenanceReport {
            results,
            webhooks,
            tasks,
        };
        let total = report.total();
        tracing::info!(
            target: "maintenance",
            evicted = total.evicted,
            namespaces_removed = total.namespaces_removed,
            "Sweep finished"
        );
        Ok(report)
    }

    /// Starts the periodic sweep on the current tokio runtime.
    ///
    /// Returns `false` without spawning if a scheduler is already running
    /// for this instance.
    pub fn start_scheduler(self: &Arc<Self>, config: &MaintenanceConfig) -> bool {
        use tokio::time::{MissedTickBehavior, interval};

        // Prevent multiple scheduler instances
        if self.scheduler_running.swap(true, Ordering::SeqCst) {
            tracing::warn!(target: "maintenance", "Scheduler already running, skipping");
            return false;
        }

        let maintenance = Arc::clone(self);
        // A zero period would make `interval` panic
        let period = config.sweep_interval().max(Duration::from_secs(1));
        let sweep_on_start = config.sweep_on_start;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(target: "maintenance", "Scheduler started ({}s interval)", period.as_secs());

            // The first tick completes immediately
            if !sweep_on_start {
                ticker.tick().await;
            }

            loop {
                ticker.tick().await;
                tracing::debug!(target: "maintenance", "Tick - sweeping expired records");

                if let Err(e) = maintenance.sweep_all().await {
                    tracing::error!(target: "maintenance", "Sweep failed: {}", e);
                }
            }
        });
        true
    }
}
