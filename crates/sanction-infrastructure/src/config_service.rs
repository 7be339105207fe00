//! Configuration service implementation.
//!
//! Loads `SanctionConfig` from `config.toml`, writing the defaults when the
//! file does not exist yet.

use crate::paths::SanctionPaths;
use crate::storage::SecretStorage;
use sanction_core::config::{SanctionConfig, SecretConfig};
use sanction_core::error::{Result, SanctionError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Loads and caches the root configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config_path: PathBuf,
    secret_path: PathBuf,
    /// Cached configuration, filled on first access
    config: Arc<RwLock<Option<SanctionConfig>>>,
}

impl ConfigService {
    pub fn new(paths: &SanctionPaths) -> Result<Self> {
        Ok(Self {
            config_path: paths.config_file()?,
            secret_path: paths.secret_file()?,
            config: Arc::new(RwLock::new(None)),
        })
    }

    /// Uses an explicit config file; `secret.json` is looked up next to it.
    pub fn with_config_file(config_path: impl AsRef<Path>) -> Self {
        let config_path = config_path.as_ref().to_path_buf();
        let secret_path = config_path
            .parent()
            .map(|p| p.join("secret.json"))
            .unwrap_or_else(|| PathBuf::from("secret.json"));
        Self {
            config_path,
            secret_path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    pub fn get_config(&self) -> Result<SanctionConfig> {
        if let Ok(read_lock) = self.config.read() {
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let loaded = self.load_config()?;

        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = Some(loaded.clone());
        }
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = None;
        }
    }

    pub fn load_secrets(&self) -> Result<SecretConfig> {
        Ok(SecretStorage::with_path(self.secret_path.clone()).load_with_env()?)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn load_config(&self) -> Result<SanctionConfig> {
        match fs::read_to_string(&self.config_path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let default_config = SanctionConfig::default();
                self.write_default(&default_config)?;
                Ok(default_config)
            }
            Err(e) => Err(SanctionError::config(format!(
                "Failed to read {}: {}",
                self.config_path.display(),
                e
            ))),
        }
    }

    fn write_default(&self, config: &SanctionConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, toml::to_string_pretty(config)?)?;
        tracing::info!(path = %self.config_path.display(), "wrote default configuration");
        Ok(())
    }
}
