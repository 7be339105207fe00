//! Execution layer: hosts long-lived approval tasks in-process.
//!
//! - `callback_hub`: single-use callback addresses with mailbox semantics
//! - `task_runtime`: journaled task scheduling with restart recovery
//! - `logging`: tracing subscriber setup
//! - `runtime`: composition root wiring storage, tasks and use cases

pub mod callback_hub;
pub mod logging;
pub mod runtime;
pub mod task_runtime;

pub use callback_hub::CallbackHub;
pub use logging::init_logging;
pub use runtime::ApprovalRuntime;
pub use task_runtime::TaskRuntime;
