//! Notification channel integration.
//!
//! - `slack_sink`: posts approval requests to Slack with approve/deny buttons
//! - `slack_callback`: parses Slack's interactive callback and builds the
//!   replacement message shown after a click

pub mod slack_callback;
pub mod slack_sink;

pub use slack_callback::{InboundCallback, SlackAck, parse_interaction};
pub use slack_sink::SlackNotificationSink;
