use anyhow::{Context, Result};
use async_trait::async_trait;
use sanction_core::approval::{ApprovalId, ApprovalRequest, CallbackAddress, NotificationSink};
use sanction_core::error::SanctionError;
use sanction_execution::{ApprovalRuntime, init_logging};
use sanction_infrastructure::{ConfigService, SanctionPaths};
use sanction_interaction::SlackNotificationSink;
use std::path::Path;
use std::sync::Arc;

/// Stands in for Slack when no bot token is configured.
///
/// Commands that never send (status, sweep, decide) still work; `request`
/// fails with the reason.
struct DisabledSink {
    reason: String,
}

#[async_trait]
impl NotificationSink for DisabledSink {
    async fn send(
        &self,
        _request: &ApprovalRequest,
        _approval_id: &ApprovalId,
        _callback_address: &CallbackAddress,
    ) -> sanction_core::Result<()> {
        Err(SanctionError::send(format!(
            "Slack is not configured: {}",
            self.reason
        )))
    }
}

/// Loads config and secrets, installs logging and assembles the runtime.
pub fn open_runtime(home: Option<&Path>) -> Result<ApprovalRuntime> {
    let paths = SanctionPaths::new(home);
    let config_service = ConfigService::new(&paths).context("Failed to resolve config path")?;
    let config = config_service.get_config().with_context(|| {
        format!(
            "Failed to load config from {}",
            config_service.config_path().display()
        )
    })?;
    init_logging(&config.logging);

    let secrets = config_service
        .load_secrets()
        .context("Failed to load secret.json")?;
    let sink: Arc<dyn NotificationSink> =
        match SlackNotificationSink::from_config(&config.slack, &secrets) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                tracing::debug!("Slack sink disabled: {}", e);
                Arc::new(DisabledSink {
                    reason: e.to_string(),
                })
            }
        };

    let data_dir = match &config.storage.base_dir {
        Some(base_dir) => base_dir.clone(),
        None => paths.data_dir().context("Failed to resolve data directory")?,
    };
    Ok(ApprovalRuntime::new(config, &data_dir, sink))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
