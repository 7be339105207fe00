//! Error types for Sanction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for every Sanction crate.
///
/// Variants follow the approval error taxonomy: validation failures are
/// rejected at the boundary, send failures surface to the caller of
/// `request()`, storage failures surface to whichever operation triggered
/// them, and stale callbacks are acknowledged as no-ops.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SanctionError {
    /// Malformed session id, approval id, storage key or callback payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// The notification sink was unreachable or rejected the message
    #[error("Send error: {0}")]
    Send(String),

    /// Key-value store read/write failure
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A decision arrived for an approval with no live callback address
    #[error("Stale callback for approval '{approval_id}'")]
    StaleCallback { approval_id: String },

    /// A callback address is already registered for this approval
    #[error("Callback already registered for approval '{approval_id}'")]
    DuplicateRegistration { approval_id: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "JSON", "TOML"
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SanctionError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a Send error
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send(message.into())
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a StaleCallback error
    pub fn stale(approval_id: impl Into<String>) -> Self {
        Self::StaleCallback {
            approval_id: approval_id.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_send(&self) -> bool {
        matches!(self, Self::Send(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleCallback { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateRegistration { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SanctionError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SanctionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SanctionError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SanctionError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for SanctionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, SanctionError>`.
pub type Result<T> = std::result::Result<T, SanctionError>;
