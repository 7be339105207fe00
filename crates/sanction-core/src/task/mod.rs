//! Long-lived task capability.
//!
//! Two primitives hosted by an execution engine:
//!
//! - `TaskScheduler`/`TaskHandler`: run work that survives process restarts,
//!   reconstructed from its own serialized arguments only.
//! - `CallbackEndpoint`: single-use network addresses whose first delivery
//!   becomes the result of `wait`.

mod callback;
mod model;

pub use callback::CallbackEndpoint;
pub use model::{TaskHandle, TaskRecord};

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Schedules a task of a registered kind with serialized arguments.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Persists the task and starts it in the background.
    ///
    /// The returned handle is only informational; the task is not bound to
    /// the caller's lifetime.
    async fn schedule(&self, kind: &str, args: Value) -> Result<TaskHandle>;
}

/// The body of a task kind.
///
/// `run` must resume correctly given only `args`, on any process instance.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn run(&self, args: Value) -> Result<()>;
}
