//! Journaled task runtime.
//!
//! Every scheduled task is written to the journal before it is spawned and
//! removed once its handler returns. After a restart, `resume_pending`
//! re-spawns whatever the journal still holds, from the persisted
//! arguments alone.

use async_trait::async_trait;
use chrono::Utc;
use sanction_core::error::{Result, SanctionError};
use sanction_core::store::KeyValueStore;
use sanction_core::task::{TaskHandle, TaskHandler, TaskRecord, TaskScheduler};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

pub struct TaskRuntime {
    journal: Arc<dyn KeyValueStore<TaskRecord>>,
    handlers: RwLock<HashMap<&'static str, Arc<dyn TaskHandler>>>,
    /// Task ids currently running in this process
    inflight: Arc<Mutex<HashSet<String>>>,
}

impl TaskRuntime {
    pub fn new(journal: Arc<dyn KeyValueStore<TaskRecord>>) -> Self {
        Self {
            journal,
            handlers: RwLock::new(HashMap::new()),
            inflight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Registers the handler for its `kind()`, replacing any previous one.
    pub fn register(&self, handler: Arc<dyn TaskHandler>) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.insert(handler.kind(), handler);
        }
    }

    /// Journaled tasks that have not completed yet.
    pub async fn pending(&self) -> Result<Vec<TaskRecord>> {
        let mut records: Vec<TaskRecord> = self
            .journal
            .list(None)
            .await?
            .into_iter()
            .map(|e| e.record)
            .collect();
        records.sort_by_key(|r| r.scheduled_at);
        Ok(records)
    }

    /// Number of tasks running in this process.
    pub fn running(&self) -> usize {
        self.inflight.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Re-spawns every journaled task not already running here.
    ///
    /// Tasks of a kind with no registered handler are left in the journal.
    pub async fn resume_pending(&self) -> Result<Vec<TaskHandle>> {
        let mut resumed = Vec::new();
        for record in self.pending().await? {
            if self.is_inflight(&record.task_id) {
                continue;
            }
            let Some(handler) = self.handler(&record.kind) else {
                tracing::warn!(task_id = %record.task_id, kind = %record.kind, "no handler for journaled task, skipping");
                continue;
            };
            tracing::info!(task_id = %record.task_id, kind = %record.kind, "resuming journaled task");
            resumed.push(self.spawn(record, handler));
        }
        Ok(resumed)
    }

    fn handler(&self, kind: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers
            .read()
            .ok()
            .and_then(|handlers| handlers.get(kind).cloned())
    }

    fn is_inflight(&self, task_id: &str) -> bool {
        self.inflight
            .lock()
            .map(|s| s.contains(task_id))
            .unwrap_or(false)
    }

    fn spawn(&self, record: TaskRecord, handler: Arc<dyn TaskHandler>) -> TaskHandle {
        let handle = record.handle();
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.insert(record.task_id.clone());
        }

        let journal = Arc::clone(&self.journal);
        let inflight = Arc::clone(&self.inflight);

        tokio::spawn(async move {
            let TaskRecord {
                task_id, kind, args, ..
            } = record;

            match handler.run(args).await {
                Ok(()) => tracing::debug!(task_id = %task_id, kind = %kind, "task completed"),
                Err(e) => tracing::error!(task_id = %task_id, kind = %kind, "task failed: {}", e),
            }

            // Failed tasks have already reported their failure; re-running
            // them after a restart would not change the outcome.
            if let Err(e) = journal.delete(None, &task_id).await {
                tracing::warn!(task_id = %task_id, "failed to remove task from journal: {}", e);
            }
            if let Ok(mut inflight) = inflight.lock() {
                inflight.remove(&task_id);
            }
        });

        handle
    }
}

#[async_trait]
impl TaskScheduler for TaskRuntime {
    async fn schedule(&self, kind: &str, args: Value) -> Result<TaskHandle> {
        let handler = self.handler(kind).ok_or_else(|| {
            SanctionError::validation(format!("no handler registered for task kind '{}'", kind))
        })?;

        let record = TaskRecord {
            task_id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            args,
            scheduled_at: Utc::now(),
        };
        self.journal.put(None, &record.task_id, &record).await?;
        tracing::debug!(task_id = %record.task_id, kind, "task journaled");

        Ok(self.spawn(record, handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanction_infrastructure::FileKvStore;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Records every run; blocks until released when `gate` is set.
    struct EchoHandler {
        runs: Mutex<Vec<Value>>,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl EchoHandler {
        fn new() -> Self {
            Self {
                runs: Mutex::new(Vec::new()),
                gate: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl TaskHandler for EchoHandler {
        fn kind(&self) -> &'static str {
            "echo"
        }

        async fn run(&self, args: Value) -> Result<()> {
            self.runs.lock().unwrap().push(args);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(SanctionError::internal("boom"));
            }
            Ok(())
        }
    }

    fn journal(temp_dir: &TempDir) -> Arc<FileKvStore<TaskRecord>> {
        Arc::new(FileKvStore::new(
            temp_dir.path().join("tasks"),
            Duration::from_secs(24 * 60 * 60),
        ))
    }

    async fn wait_idle(runtime: &TaskRuntime) {
        for _ in 0..200 {
            if runtime.running() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("tasks did not finish");
    }

    #[tokio::test]
    async fn test_schedule_runs_and_clears_journal() {
        let temp_dir = TempDir::new().unwrap();
        let runtime = TaskRuntime::new(journal(&temp_dir));
        let handler = Arc::new(EchoHandler::new());
        runtime.register(handler.clone());

        let handle = runtime
            .schedule("echo", serde_json::json!({ "n": 1 }))
            .await
            .unwrap();
        assert_eq!(handle.kind, "echo");

        wait_idle(&runtime).await;
        assert_eq!(handler.runs.lock().unwrap().len(), 1);
        assert!(runtime.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_task_is_cleared_too() {
        let temp_dir = TempDir::new().unwrap();
        let runtime = TaskRuntime::new(journal(&temp_dir));
        runtime.register(Arc::new(EchoHandler {
            fail: true,
            ..EchoHandler::new()
        }));

        runtime.schedule("echo", Value::Null).await.unwrap();
        wait_idle(&runtime).await;
        assert!(runtime.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let runtime = TaskRuntime::new(journal(&temp_dir));

        let err = runtime.schedule("nope", Value::Null).await.unwrap_err();
        assert!(err.is_validation());
        assert!(runtime.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_pending_after_restart() {
        let temp_dir = TempDir::new().unwrap();
        let gate = Arc::new(Notify::new());

        // First process: the task is journaled but never finishes
        {
            let runtime = TaskRuntime::new(journal(&temp_dir));
            runtime.register(Arc::new(EchoHandler {
                gate: Some(gate.clone()),
                ..EchoHandler::new()
            }));
            runtime
                .schedule("echo", serde_json::json!({ "approvalId": "a" }))
                .await
                .unwrap();
            assert_eq!(runtime.pending().await.unwrap().len(), 1);
        }

        // Second process: same journal, fresh handler
        let runtime = TaskRuntime::new(journal(&temp_dir));
        let handler = Arc::new(EchoHandler::new());
        runtime.register(handler.clone());

        let resumed = runtime.resume_pending().await.unwrap();
        assert_eq!(resumed.len(), 1);

        wait_idle(&runtime).await;
        assert_eq!(
            handler.runs.lock().unwrap().as_slice(),
            &[serde_json::json!({ "approvalId": "a" })]
        );
        assert!(runtime.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_skips_running_tasks() {
        let temp_dir = TempDir::new().unwrap();
        let gate = Arc::new(Notify::new());
        let runtime = TaskRuntime::new(journal(&temp_dir));
        let handler = Arc::new(EchoHandler {
            gate: Some(gate.clone()),
            ..EchoHandler::new()
        });
        runtime.register(handler.clone());

        runtime.schedule("echo", Value::Null).await.unwrap();
        assert!(runtime.resume_pending().await.unwrap().is_empty());

        gate.notify_one();
        wait_idle(&runtime).await;
        assert_eq!(handler.runs.lock().unwrap().len(), 1);
    }
}
