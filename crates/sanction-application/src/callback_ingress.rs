//! Callback ingress: routes a reviewer's decision to the waiting approval.
//!
//! A click with no live callback address (already consumed, expired, or
//! never registered) is acknowledged as stale rather than failed, so the
//! reviewer still gets a confirmation.

use sanction_core::approval::{ApprovalId, Decision, WebhookRegistry};
use sanction_core::error::Result;
use sanction_core::task::CallbackEndpoint;
use sanction_interaction::{SlackAck, parse_interaction};
use std::sync::Arc;

/// Outcome of an inbound decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressAck {
    /// Handed to the waiting approval
    Delivered {
        approval_id: ApprovalId,
        approved: bool,
    },
    /// No approval was waiting on this id any more
    Stale { approval_id: ApprovalId },
}

impl IngressAck {
    pub fn is_stale(&self) -> bool {
        matches!(self, IngressAck::Stale { .. })
    }
}

pub struct CallbackIngress {
    registry: Arc<dyn WebhookRegistry>,
    endpoint: Arc<dyn CallbackEndpoint>,
}

impl CallbackIngress {
    pub fn new(registry: Arc<dyn WebhookRegistry>, endpoint: Arc<dyn CallbackEndpoint>) -> Self {
        Self { registry, endpoint }
    }

    /// Delivers `decision` to whichever address awaits `approval_id`.
    pub async fn accept(&self, approval_id: &ApprovalId, decision: Decision) -> Result<IngressAck> {
        let Some(address) = self.registry.resolve(approval_id).await? else {
            tracing::warn!(approval_id = %approval_id, "stale callback: no live callback address");
            return Ok(IngressAck::Stale {
                approval_id: approval_id.clone(),
            });
        };

        let approved = decision.approved;
        match self.endpoint.deliver(&address, decision).await {
            Ok(()) => {
                tracing::info!(approval_id = %approval_id, approved, "decision delivered");
                Ok(IngressAck::Delivered {
                    approval_id: approval_id.clone(),
                    approved,
                })
            }
            Err(e) if e.is_stale() => {
                tracing::warn!(approval_id = %approval_id, "stale callback: address already struck");
                Ok(IngressAck::Stale {
                    approval_id: approval_id.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Validates a raw approval id before delivering.
    pub async fn accept_raw(&self, approval_id: &str, decision: Decision) -> Result<IngressAck> {
        let approval_id = ApprovalId::parse(approval_id)?;
        self.accept(&approval_id, decision).await
    }

    /// Handles Slack's interactive callback body and returns the replacement message.
    pub async fn accept_slack(&self, form_body: &str) -> Result<SlackAck> {
        let callback = parse_interaction(form_body)?;
        let ack = self.accept(&callback.approval_id, callback.decision).await?;
        Ok(match ack {
            IngressAck::Delivered { approved, .. } => {
                SlackAck::delivered(approved, callback.user_id.as_deref())
            }
            IngressAck::Stale { .. } => SlackAck::stale(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryEndpoint, MemoryRegistry};

    fn ingress() -> (CallbackIngress, Arc<MemoryRegistry>, Arc<MemoryEndpoint>) {
        let registry = Arc::new(MemoryRegistry::default());
        let endpoint = Arc::new(MemoryEndpoint::default());
        (
            CallbackIngress::new(registry.clone(), endpoint.clone()),
            registry,
            endpoint,
        )
    }

    fn slack_body(action_id: &str, block_id: &str) -> String {
        let payload = serde_json::json!({
            "type": "block_actions",
            "user": { "id": "U42" },
            "actions": [{ "action_id": action_id, "block_id": block_id }]
        });
        // No `&`, `+` or `%` in the payload, so it needs no escaping
        format!("payload={}", payload)
    }

    #[tokio::test]
    async fn test_delivers_to_waiting_address() {
        let (ingress, registry, endpoint) = ingress();
        let id = ApprovalId::generate();
        let address = registry.register(&id).await.unwrap();

        let ack = ingress
            .accept(&id, Decision::approve("Approved"))
            .await
            .unwrap();

        assert_eq!(
            ack,
            IngressAck::Delivered {
                approval_id: id,
                approved: true
            }
        );
        assert_eq!(
            endpoint.wait(&address).await.unwrap(),
            Decision::approve("Approved")
        );
    }

    #[tokio::test]
    async fn test_unknown_approval_is_stale() {
        let (ingress, _, _) = ingress();
        let ack = ingress
            .accept(&ApprovalId::generate(), Decision::approve("Approved"))
            .await
            .unwrap();
        assert!(ack.is_stale());
    }

    #[tokio::test]
    async fn test_second_click_before_consume_is_stale() {
        let (ingress, registry, _) = ingress();
        let id = ApprovalId::generate();
        registry.register(&id).await.unwrap();

        let first = ingress.accept(&id, Decision::approve("Approved")).await.unwrap();
        let second = ingress.accept(&id, Decision::deny("Denied")).await.unwrap();

        assert!(!first.is_stale());
        assert!(second.is_stale());
    }

    #[tokio::test]
    async fn test_malformed_id_is_a_validation_error() {
        let (ingress, _, _) = ingress();
        let err = ingress
            .accept_raw("approval_x", Decision::approve("Approved"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_slack_click_roundtrip() {
        let (ingress, registry, _) = ingress();
        let id = ApprovalId::generate();
        registry.register(&id).await.unwrap();

        let body = slack_body(&format!("approve_{}", id), id.as_str());
        let ack = ingress.accept_slack(&body).await.unwrap();
        assert_eq!(ack.text, "Request approved by <@U42>");

        registry.consume(&id).await.unwrap();
        let ack = ingress.accept_slack(&body).await.unwrap();
        assert_eq!(ack, SlackAck::stale());
    }
}
