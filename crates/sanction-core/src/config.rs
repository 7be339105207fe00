//! Configuration model.
//!
//! Every field carries a serde default, so an empty `config.toml` is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WEBHOOK_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_RESULT_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_TASK_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 15 * 60;
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct SanctionConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Root of all persisted partitions; resolved to the platform data
    /// directory when unset
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default = "default_webhook_ttl_secs")]
    pub webhook_ttl_secs: u64,
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
    /// Retention of the task journal
    #[serde(default = "default_task_ttl_secs")]
    pub task_ttl_secs: u64,
}

impl StorageConfig {
    pub fn webhook_ttl(&self) -> Duration {
        Duration::from_secs(self.webhook_ttl_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            webhook_ttl_secs: DEFAULT_WEBHOOK_TTL_SECS,
            result_ttl_secs: DEFAULT_RESULT_TTL_SECS,
            task_ttl_secs: DEFAULT_TASK_TTL_SECS,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CallbackConfig {
    /// Externally reachable origin; addresses are `<this>/callbacks/<token>`
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct SlackConfig {
    /// Channel the approval requests are posted to
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Override for the Web API origin (tests, proxies)
    #[serde(default)]
    pub api_base_url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MaintenanceConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_true")]
    pub sweep_on_start: bool,
}

impl MaintenanceConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            sweep_on_start: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

/// Secrets kept out of `config.toml` (stored in `secret.json`).
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct SecretConfig {
    #[serde(default)]
    pub slack: Option<SlackSecret>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SlackSecret {
    pub bot_token: String,
}

fn default_webhook_ttl_secs() -> u64 {
    DEFAULT_WEBHOOK_TTL_SECS
}

fn default_result_ttl_secs() -> u64 {
    DEFAULT_RESULT_TTL_SECS
}

fn default_task_ttl_secs() -> u64 {
    DEFAULT_TASK_TTL_SECS
}

fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_string()
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
