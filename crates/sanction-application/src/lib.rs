//! Application layer for Sanction.
//!
//! Use cases composed from the core seams:
//!
//! - `approval_orchestrator`: issue an approval request (blocking or fire-and-forget)
//! - `await_decision`: the long-lived task body that waits for the reviewer
//! - `callback_ingress`: route an inbound decision to its waiting approval
//! - `approval_status`: polling view over a session's results
//! - `storage_maintenance`: periodic TTL sweep

pub mod approval_orchestrator;
pub mod approval_status;
pub mod await_decision;
pub mod callback_ingress;
pub mod storage_maintenance;

#[cfg(test)]
mod test_support;

pub use approval_orchestrator::{ApprovalMode, ApprovalOrchestrator};
pub use approval_status::{ApprovalStatus, ApprovalStatusService, ApprovalSummary};
pub use await_decision::{AWAIT_DECISION_TASK, AwaitDecisionArgs, AwaitDecisionHandler};
pub use callback_ingress::{CallbackIngress, IngressAck};
pub use storage_maintenance::{MaintenanceReport, StorageMaintenance};
