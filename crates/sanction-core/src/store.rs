//! Generic TTL-bound key-value store.
//!
//! Small serializable records under a string key, optionally grouped into a
//! namespace. Expiry is lazy: a record older than the store's TTL is evicted
//! the first time it is read. `sweep` exists only to bound the storage
//! footprint.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A record together with its storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry<T> {
    pub key: String,
    /// Assigned by the store on write; TTL is measured from here
    pub stored_at: DateTime<Utc>,
    pub record: T,
}

impl<T> StoredEntry<T> {
    /// True if `now - stored_at` exceeds `ttl`.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age > ttl,
            // TTL too large to represent never expires
            Err(_) => false,
        }
    }
}

/// Counts produced by a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub evicted: usize,
    pub namespaces_removed: usize,
}

impl SweepReport {
    pub fn merge(self, other: SweepReport) -> SweepReport {
        SweepReport {
            evicted: self.evicted + other.evicted,
            namespaces_removed: self.namespaces_removed + other.namespaces_removed,
        }
    }
}

/// Namespaced key-value store with a fixed time-to-live.
///
/// `namespace = None` addresses the flat key space.
#[async_trait]
pub trait KeyValueStore<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Time-to-live applied at read time.
    fn ttl(&self) -> Duration;

    /// Writes `record`, overwriting any previous value (last write wins).
    async fn put(&self, namespace: Option<&str>, key: &str, record: &T) -> Result<StoredEntry<T>>;

    /// Writes `record` only if no live entry exists under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(entry))`: Record written
    /// - `Ok(None)`: A non-expired entry already exists; nothing written
    async fn put_if_absent(
        &self,
        namespace: Option<&str>,
        key: &str,
        record: &T,
    ) -> Result<Option<StoredEntry<T>>>;

    /// Reads a live entry; an expired one is deleted and reported absent.
    async fn get(&self, namespace: Option<&str>, key: &str) -> Result<Option<StoredEntry<T>>>;

    /// Lists every live entry in `namespace`, evicting expired ones.
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<StoredEntry<T>>>;

    /// Removes `key`; not an error if absent.
    async fn delete(&self, namespace: Option<&str>, key: &str) -> Result<()>;

    /// Walks every namespace, evicts expired entries and removes empty namespaces.
    async fn sweep(&self) -> Result<SweepReport>;
}
