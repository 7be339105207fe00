//! Approval domain module.
//!
//! # Module Structure
//!
//! - `model`: approval value types (`ApprovalId`, `ApprovalRequest`, `Decision`,
//!   `ApprovalResult`, `WebhookRecord`, `CallbackAddress`, `ApprovalOutcome`)
//! - `repository`: persistence seams (`WebhookRegistry`, `ApprovalResultRepository`)
//! - `notification`: outbound seam to the channel a human reviews on

mod model;
mod notification;
mod repository;

pub use model::{
    ApprovalId, ApprovalOutcome, ApprovalRequest, ApprovalResult, CallbackAddress, Decision,
    WebhookRecord,
};
pub use notification::NotificationSink;
pub use repository::{ApprovalResultRepository, WebhookRegistry};
