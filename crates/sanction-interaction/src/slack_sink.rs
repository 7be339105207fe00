//! SlackNotificationSink - posts approval requests via `chat.postMessage`.
//!
//! The message carries the approval id as the `block_id` of its actions
//! block, and the callback address URL as the value of each button, so the
//! click that comes back can be correlated either way.
//!
//! Configuration priority: secret.json > environment variables

use async_trait::async_trait;
use reqwest::Client;
use sanction_core::approval::{ApprovalId, ApprovalRequest, CallbackAddress, NotificationSink};
use sanction_core::config::{SecretConfig, SlackConfig};
use sanction_core::error::{Result, SanctionError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::env;
use std::time::Duration;

const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";
const CHANNEL_ENV: &str = "SLACK_APPROVAL_CHANNEL_ID";

/// Notification sink backed by the Slack Web API.
#[derive(Clone)]
pub struct SlackNotificationSink {
    client: Client,
    api_base_url: String,
    bot_token: String,
    channel_id: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: String,
    blocks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

impl SlackNotificationSink {
    pub fn new(bot_token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base_url: DEFAULT_SLACK_API_URL.to_string(),
            bot_token: bot_token.into(),
            channel_id: channel_id.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Builds a sink from loaded configuration.
    ///
    /// The channel falls back to `SLACK_APPROVAL_CHANNEL_ID` when the config
    /// leaves it unset. The token is expected to be resolved already (see
    /// `SecretStorage::load_with_env`).
    pub fn from_config(slack: &SlackConfig, secrets: &SecretConfig) -> Result<Self> {
        let bot_token = secrets
            .slack
            .as_ref()
            .map(|s| s.bot_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                SanctionError::config("SLACK_BOT_TOKEN not found in secret.json or environment variables")
            })?;

        let channel_id = slack
            .channel_id
            .clone()
            .or_else(|| env::var(CHANNEL_ENV).ok())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                SanctionError::config(format!(
                    "slack.channel_id not set in config.toml and {} not set",
                    CHANNEL_ENV
                ))
            })?;

        let mut sink = Self::new(bot_token, channel_id);
        if let Some(url) = &slack.api_base_url {
            sink = sink.with_api_base_url(url.clone());
        }
        Ok(sink)
    }

    /// Overrides the Web API origin.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

/// Block Kit layout for one approval request.
pub fn approval_blocks(
    request: &ApprovalRequest,
    approval_id: &ApprovalId,
    callback_address: &CallbackAddress,
) -> Vec<Value> {
    vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": "Approval Request", "emoji": true }
        }),
        json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*Situation:*\n{}", request.situation) },
                { "type": "mrkdwn", "text": format!("*Reason:*\n{}", request.reason) }
            ]
        }),
        json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Context:*\n{}", request.context) }
        }),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("*Requested Action:*\n{}", request.requested_action)
            }
        }),
        json!({
            "type": "actions",
            "block_id": approval_id.as_str(),
            "elements": [
                {
                    "type": "button",
                    "text": { "type": "plain_text", "text": "Approve", "emoji": true },
                    "style": "primary",
                    "action_id": format!("approve_{}", approval_id),
                    "value": callback_address.url
                },
                {
                    "type": "button",
                    "text": { "type": "plain_text", "text": "Deny", "emoji": true },
                    "style": "danger",
                    "action_id": format!("deny_{}", approval_id),
                    "value": callback_address.url
                }
            ]
        }),
    ]
}

#[async_trait]
impl NotificationSink for SlackNotificationSink {
    async fn send(
        &self,
        request: &ApprovalRequest,
        approval_id: &ApprovalId,
        callback_address: &CallbackAddress,
    ) -> Result<()> {
        let body = PostMessageRequest {
            channel: &self.channel_id,
            text: format!("Approval needed: {}", request.situation),
            blocks: approval_blocks(request, approval_id, callback_address),
        };

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base_url))
            .bearer_auth(&self.bot_token)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SanctionError::send(format!("Slack request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SanctionError::send(format!(
                "Slack API error ({}): {}",
                status, error_text
            )));
        }

        let api_response: SlackApiResponse = response
            .json()
            .await
            .map_err(|e| SanctionError::send(format!("Failed to parse Slack response: {}", e)))?;

        if !api_response.ok {
            return Err(SanctionError::send(format!(
                "Slack rejected message: {}",
                api_response.error.as_deref().unwrap_or("unknown_error")
            )));
        }

        tracing::info!(
            approval_id = %approval_id,
            channel = %self.channel_id,
            ts = ?api_response.ts,
            "approval request posted to Slack"
        );
        Ok(())
    }
}
