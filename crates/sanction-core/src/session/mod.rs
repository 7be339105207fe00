//! Session domain module.
//!
//! A session scopes every approval to one conversation. It has no storage of
//! its own; the id is only a partition key for stored approval results.

mod identity;

pub use identity::{SessionId, generate_token, is_token};
