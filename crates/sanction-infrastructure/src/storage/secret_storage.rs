//! `secret.json` loader.
//!
//! The Slack bot token lives here rather than in `config.toml`. When the
//! file carries no Slack entry, `SLACK_BOT_TOKEN` is consulted.

use sanction_core::config::{SecretConfig, SlackSecret};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SLACK_BOT_TOKEN_ENV: &str = "SLACK_BOT_TOKEN";

#[derive(Debug, Error)]
pub enum SecretStorageError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid secret JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<SecretStorageError> for sanction_core::SanctionError {
    fn from(e: SecretStorageError) -> Self {
        sanction_core::SanctionError::config(e.to_string())
    }
}

/// Read-only view of the secrets file. Keep it mode 600.
pub struct SecretStorage {
    path: PathBuf,
}

impl SecretStorage {
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parses the file. Absent file means no secrets.
    pub fn load(&self) -> Result<SecretConfig, SecretStorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SecretConfig::default()),
            Err(source) => {
                return Err(SecretStorageError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|source| SecretStorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Like `load`, then fills a missing Slack entry from the environment.
    pub fn load_with_env(&self) -> Result<SecretConfig, SecretStorageError> {
        let secrets = self.load()?;
        Ok(with_env_fallback(
            secrets,
            std::env::var(SLACK_BOT_TOKEN_ENV).ok(),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn with_env_fallback(mut secrets: SecretConfig, env_token: Option<String>) -> SecretConfig {
    if secrets.slack.is_none() {
        secrets.slack = env_token
            .filter(|t| !t.trim().is_empty())
            .map(|bot_token| SlackSecret { bot_token });
    }
    secrets
}
