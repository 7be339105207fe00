use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifies a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: String,
    pub kind: String,
}

/// Journal entry for a scheduled task, enough to restart it from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub kind: String,
    pub args: Value,
    pub scheduled_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            task_id: self.task_id.clone(),
            kind: self.kind.clone(),
        }
    }
}
