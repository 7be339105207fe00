//! In-process `CallbackEndpoint`.
//!
//! Addresses are `<public_base_url>/callbacks/<approval_id>-<32 hex>`. Each
//! token moves through:
//!
//! ```text
//!            wait                 deliver
//! (unknown) ─────► Waiting ──────────────────► Struck
//!     │                                          ▲
//!     └─ deliver ─► Delivered (mailbox) ── wait ─┘
//! ```
//!
//! Any delivery to a `Delivered` or `Struck` token is stale. Settled slots
//! are forgotten after the retention window.

use async_trait::async_trait;
use sanction_core::approval::{ApprovalId, CallbackAddress, Decision};
use sanction_core::error::{Result, SanctionError};
use sanction_core::task::CallbackEndpoint;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

const NONCE_LEN: usize = 32;

enum Slot {
    Waiting(oneshot::Sender<Decision>),
    Delivered(Decision),
    Struck,
}

struct Entry {
    slot: Slot,
    since: Instant,
}

impl Entry {
    fn new(slot: Slot) -> Self {
        Self {
            slot,
            since: Instant::now(),
        }
    }
}

pub struct CallbackHub {
    public_base_url: String,
    retention: Duration,
    slots: Mutex<HashMap<String, Entry>>,
}

impl CallbackHub {
    /// # Arguments
    ///
    /// * `public_base_url` - Origin the addresses are reachable under
    /// * `retention` - How long settled tokens are remembered (the webhook TTL)
    pub fn new(public_base_url: impl Into<String>, retention: Duration) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            retention,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Delivers to an address known only by its token, as when the sink
    /// POSTs straight to the URL.
    pub async fn deliver_token(&self, token: &str, decision: Decision) -> Result<()> {
        parse_token(token)?;
        let address = CallbackAddress::new(&self.public_base_url, token);
        self.deliver(&address, decision).await
    }

    /// Number of tokens currently tracked.
    pub fn tracked(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.slots
            .lock()
            .map_err(|_| SanctionError::internal("callback hub lock poisoned"))
    }

    /// Drops settled and undelivered-mailbox slots older than the retention window.
    fn prune(&self, slots: &mut HashMap<String, Entry>) {
        let retention = self.retention;
        slots.retain(|_, entry| match entry.slot {
            Slot::Waiting(ref tx) => !tx.is_closed(),
            Slot::Delivered(_) | Slot::Struck => entry.since.elapsed() <= retention,
        });
    }
}

/// Extracts the approval id from a hub token.
pub fn parse_token(token: &str) -> Result<ApprovalId> {
    let malformed = || SanctionError::validation(format!("malformed callback token '{}'", token));

    let (approval, nonce) = token.rsplit_once('-').ok_or_else(malformed)?;
    let nonce_ok = nonce.len() == NONCE_LEN
        && nonce
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !nonce_ok {
        return Err(malformed());
    }
    ApprovalId::parse(approval).map_err(|_| malformed())
}

fn stale(token: &str) -> SanctionError {
    match parse_token(token) {
        Ok(approval_id) => SanctionError::stale(approval_id.as_str()),
        Err(_) => SanctionError::stale(token),
    }
}

#[async_trait]
impl CallbackEndpoint for CallbackHub {
    fn allocate(&self, approval_id: &ApprovalId) -> CallbackAddress {
        let token = format!("{}-{}", approval_id, uuid::Uuid::new_v4().simple());
        CallbackAddress::new(&self.public_base_url, token)
    }

    async fn wait(&self, address: &CallbackAddress) -> Result<Decision> {
        let rx = {
            let mut slots = self.lock()?;
            self.prune(&mut slots);

            match slots.remove(&address.token) {
                Some(Entry {
                    slot: Slot::Delivered(decision),
                    ..
                }) => {
                    slots.insert(address.token.clone(), Entry::new(Slot::Struck));
                    tracing::debug!(token = %address.token, "decision taken from mailbox");
                    return Ok(decision);
                }
                Some(entry @ Entry {
                    slot: Slot::Struck, ..
                }) => {
                    slots.insert(address.token.clone(), entry);
                    return Err(stale(&address.token));
                }
                Some(entry @ Entry {
                    slot: Slot::Waiting(_),
                    ..
                }) => {
                    // prune() just dropped closed waiters, so this one is live
                    slots.insert(address.token.clone(), entry);
                    return Err(SanctionError::internal(format!(
                        "callback address '{}' is already awaited",
                        address.token
                    )));
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    slots.insert(address.token.clone(), Entry::new(Slot::Waiting(tx)));
                    rx
                }
            }
        };

        rx.await
            .map_err(|_| SanctionError::internal("callback hub dropped the waiter"))
    }

    async fn deliver(&self, address: &CallbackAddress, decision: Decision) -> Result<()> {
        let mut slots = self.lock()?;
        self.prune(&mut slots);

        match slots.remove(&address.token) {
            None => {
                tracing::debug!(token = %address.token, "no waiter yet, holding decision");
                slots.insert(address.token.clone(), Entry::new(Slot::Delivered(decision)));
                Ok(())
            }
            Some(Entry {
                slot: Slot::Waiting(tx),
                ..
            }) => match tx.send(decision) {
                Ok(()) => {
                    slots.insert(address.token.clone(), Entry::new(Slot::Struck));
                    Ok(())
                }
                // Waiter went away between prune and send; keep it for the next wait
                Err(decision) => {
                    slots.insert(address.token.clone(), Entry::new(Slot::Delivered(decision)));
                    Ok(())
                }
            },
            Some(entry) => {
                slots.insert(address.token.clone(), entry);
                Err(stale(&address.token))
            }
        }
    }
}
