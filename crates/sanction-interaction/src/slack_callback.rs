//! Slack interactive callback handling.
//!
//! Slack posts button clicks as `application/x-www-form-urlencoded` with a
//! single `payload` field holding the JSON interaction. Only `block_actions`
//! interactions are accepted.

use reqwest::Url;
use sanction_core::approval::{ApprovalId, Decision};
use sanction_core::error::{Result, SanctionError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const APPROVE_PREFIX: &str = "approve_";
const DENY_PREFIX: &str = "deny_";

/// A reviewer's click, correlated back to its approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCallback {
    pub approval_id: ApprovalId,
    pub decision: Decision,
    /// Slack user who clicked, if present in the payload
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Interaction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    user: Option<InteractionUser>,
    #[serde(default)]
    actions: Vec<InteractionAction>,
}

#[derive(Debug, Deserialize)]
struct InteractionUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct InteractionAction {
    action_id: String,
    block_id: String,
}

/// Parses a raw form body as posted by Slack.
///
/// # Returns
///
/// - `Ok(InboundCallback)`: A well-formed approve/deny click
/// - `Err(SanctionError::Validation)`: Missing payload, wrong interaction type,
///   unknown action, or a block id that is not an approval id
pub fn parse_interaction(form_body: &str) -> Result<InboundCallback> {
    let payload = form_field(form_body, "payload")
        .ok_or_else(|| SanctionError::validation("no payload found in callback body"))?;

    let interaction: Interaction = serde_json::from_str(&payload)
        .map_err(|e| SanctionError::validation(format!("malformed callback payload: {}", e)))?;

    if interaction.kind != "block_actions" {
        return Err(SanctionError::validation(format!(
            "unsupported interaction type '{}'",
            interaction.kind
        )));
    }

    let action = interaction
        .actions
        .into_iter()
        .next()
        .ok_or_else(|| SanctionError::validation("callback payload has no actions"))?;

    let approved = if action.action_id.starts_with(APPROVE_PREFIX) {
        true
    } else if action.action_id.starts_with(DENY_PREFIX) {
        false
    } else {
        return Err(SanctionError::validation(format!(
            "unknown action '{}'",
            action.action_id
        )));
    };

    let approval_id = ApprovalId::parse(&action.block_id)?;
    let decision = if approved {
        Decision::approve("Approved")
    } else {
        Decision::deny("Denied")
    };

    Ok(InboundCallback {
        approval_id,
        decision,
        user_id: interaction.user.map(|u| u.id),
    })
}

fn form_field(form_body: &str, name: &str) -> Option<String> {
    let mut url = Url::parse("http://callback.invalid/").ok()?;
    url.set_query(Some(form_body));
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Replacement message returned to Slack after a click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackAck {
    pub replace_original: bool,
    pub text: String,
    pub blocks: Vec<Value>,
}

impl SlackAck {
    /// Acknowledges a decision that reached its waiting approval.
    pub fn delivered(approved: bool, user_id: Option<&str>) -> Self {
        let verdict = if approved {
            "Request approved"
        } else {
            "Request denied"
        };
        let text = match user_id {
            Some(user) => format!("{} by <@{}>", verdict, user),
            None => verdict.to_string(),
        };
        Self::section(text)
    }

    /// Acknowledges a click on an approval that is no longer waiting.
    pub fn stale() -> Self {
        Self::section("This request was already handled or has expired.".to_string())
    }

    fn section(text: String) -> Self {
        Self {
            replace_original: true,
            blocks: vec![json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": text }
            })],
            text,
        }
    }
}
