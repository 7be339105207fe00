//! Path management for Sanction storage and configuration.
//!
//! Directories are resolved once at construction and injected into the
//! stores; no store reads ambient environment state on its own.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/sanction/          # Config directory
//! ├── config.toml              # Application configuration
//! └── secret.json              # Slack bot token
//!
//! ~/.local/share/sanction/     # Data directory (storage.base_dir)
//! ├── webhooks/                # approval id -> callback address (TTL 1h)
//! ├── approval-results/        # one sub-directory per session (TTL 24h)
//! │   └── sess_.../
//! └── tasks/                   # task journal
//! ```

use std::path::{Path, PathBuf};

const APP_NAME: &str = "sanction";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for sanction_core::SanctionError {
    fn from(err: PathError) -> Self {
        sanction_core::SanctionError::config(err.to_string())
    }
}

/// The persisted partitions under the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Webhooks,
    ApprovalResults,
    Tasks,
}

impl Partition {
    pub fn dir_name(self) -> &'static str {
        match self {
            Partition::Webhooks => "webhooks",
            Partition::ApprovalResults => "approval-results",
            Partition::Tasks => "tasks",
        }
    }
}

/// Resolved directory layout.
#[derive(Debug, Clone)]
pub struct SanctionPaths {
    config_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
}

impl SanctionPaths {
    /// Creates a layout rooted at `base_dir`, or at the platform directories
    /// when `None`.
    ///
    /// With an explicit base, configuration and data share the same root.
    pub fn new(base_dir: Option<&Path>) -> Self {
        match base_dir {
            Some(base) => Self {
                config_dir: Some(base.to_path_buf()),
                data_dir: Some(base.to_path_buf()),
            },
            None => Self {
                config_dir: dirs::config_dir().map(|d| d.join(APP_NAME)),
                data_dir: dirs::data_dir().map(|d| d.join(APP_NAME)),
            },
        }
    }

    /// Overrides only the data directory (`storage.base_dir` from config).
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        self.config_dir.clone().ok_or(PathError::HomeDirNotFound)
    }

    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        self.data_dir.clone().ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Returns the path to the secrets file.
    ///
    /// # Security Note
    ///
    /// Ensure this file has appropriate permissions (e.g., 600).
    pub fn secret_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("secret.json"))
    }

    pub fn partition_dir(&self, partition: Partition) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join(partition.dir_name()))
    }
}
