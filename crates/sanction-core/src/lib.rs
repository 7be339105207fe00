//! Domain layer for Sanction.
//!
//! Types and seams for requesting a decision from a human reviewer and
//! resuming once it arrives, possibly hours later and on another process.

pub mod approval;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod task;

// Re-export common error type
pub use error::{Result, SanctionError};
