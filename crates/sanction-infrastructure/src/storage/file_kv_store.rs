//! File-backed implementation of `KeyValueStore`.
//!
//! Directory structure:
//! ```text
//! root/
//! ├── <key>.json              # flat key space (namespace = None)
//! └── <namespace>/
//!     └── <key>.json
//! ```
//!
//! Each file holds a `StoredEntry` envelope. Blocking file I/O runs on the
//! tokio blocking pool.

use super::atomic_json::AtomicJsonFile;
use async_trait::async_trait;
use chrono::Utc;
use sanction_core::error::{Result, SanctionError};
use sanction_core::store::{KeyValueStore, StoredEntry, SweepReport};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

const RECORD_EXTENSION: &str = "json";

/// Namespaced TTL store persisted as one JSON file per key.
pub struct FileKvStore<T> {
    root: PathBuf,
    ttl: Duration,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for FileKvStore<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            ttl: self.ttl,
            _phantom: PhantomData,
        }
    }
}

impl<T> FileKvStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a store rooted at `root`.
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
            _phantom: PhantomData,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_file(&self, namespace: Option<&str>, key: &str) -> Result<AtomicJsonFile<StoredEntry<T>>> {
        validate_segment("key", key)?;
        let dir = self.namespace_dir(namespace)?;
        Ok(AtomicJsonFile::new(
            dir.join(format!("{}.{}", key, RECORD_EXTENSION)),
        ))
    }

    fn namespace_dir(&self, namespace: Option<&str>) -> Result<PathBuf> {
        match namespace {
            Some(ns) => {
                validate_segment("namespace", ns)?;
                Ok(self.root.join(ns))
            }
            None => Ok(self.root.clone()),
        }
    }

    fn new_entry(key: &str, record: &T) -> StoredEntry<T> {
        StoredEntry {
            key: key.to_string(),
            stored_at: Utc::now(),
            record: record.clone(),
        }
    }
}

#[async_trait]
impl<T> KeyValueStore<T> for FileKvStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn put(&self, namespace: Option<&str>, key: &str, record: &T) -> Result<StoredEntry<T>> {
        let file = self.entry_file(namespace, key)?;
        let entry = Self::new_entry(key, record);
        let written = entry.clone();

        blocking(move || file.save(&written).map_err(SanctionError::from)).await?;

        tracing::debug!(namespace = ?namespace, key, "stored record");
        Ok(entry)
    }

    async fn put_if_absent(
        &self,
        namespace: Option<&str>,
        key: &str,
        record: &T,
    ) -> Result<Option<StoredEntry<T>>> {
        let file = self.entry_file(namespace, key)?;
        let entry = Self::new_entry(key, record);
        let ttl = self.ttl;

        blocking(move || {
            file.with_lock(|f| {
                if let Some(existing) = f.load()? {
                    if !existing.is_expired(ttl, Utc::now()) {
                        return Ok(None);
                    }
                }
                f.save(&entry)?;
                Ok(Some(entry))
            })
            .map_err(SanctionError::from)
        })
        .await
    }

    async fn get(&self, namespace: Option<&str>, key: &str) -> Result<Option<StoredEntry<T>>> {
        let file = self.entry_file(namespace, key)?;
        let ttl = self.ttl;

        blocking(move || {
            let Some(entry) = file.load()? else {
                return Ok(None);
            };
            if entry.is_expired(ttl, Utc::now()) {
                tracing::debug!(path = %file.path().display(), "evicting expired record");
                file.remove()?;
                return Ok(None);
            }
            Ok(Some(entry))
        })
        .await
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<StoredEntry<T>>> {
        let dir = self.namespace_dir(namespace)?;
        let ttl = self.ttl;

        blocking(move || {
            let (live, _evicted) = scan_dir::<T>(&dir, ttl)?;
            Ok(live)
        })
        .await
    }

    async fn delete(&self, namespace: Option<&str>, key: &str) -> Result<()> {
        let file = self.entry_file(namespace, key)?;
        blocking(move || file.remove().map(|_| ()).map_err(SanctionError::from)).await
    }

    async fn sweep(&self) -> Result<SweepReport> {
        let root = self.root.clone();
        let ttl = self.ttl;

        let report = blocking(move || {
            let mut report = SweepReport::default();
            if !root.is_dir() {
                return Ok(report);
            }

            let (_, evicted) = scan_dir::<T>(&root, ttl)?;
            report.evicted += evicted;

            for dir_entry in fs::read_dir(&root)? {
                let path = dir_entry?.path();
                if !path.is_dir() {
                    continue;
                }
                let (live, evicted) = scan_dir::<T>(&path, ttl)?;
                report.evicted += evicted;
                if live.is_empty() && remove_empty_namespace(&path) {
                    report.namespaces_removed += 1;
                }
            }
            Ok(report)
        })
        .await?;

        tracing::info!(
            root = %self.root.display(),
            evicted = report.evicted,
            namespaces_removed = report.namespaces_removed,
            "sweep completed"
        );
        Ok(report)
    }
}

/// Reads every record file in `dir`, deleting expired ones.
///
/// Unreadable records are logged and skipped so one corrupt file does not
/// hide the rest of the namespace.
fn scan_dir<T>(dir: &Path, ttl: Duration) -> Result<(Vec<StoredEntry<T>>, usize)>
where
    T: Serialize + DeserializeOwned,
{
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e.into()),
    };

    let now = Utc::now();
    let mut live = Vec::new();
    let mut evicted = 0;

    for dir_entry in read_dir {
        let path = dir_entry?.path();
        if !is_record_file(&path) {
            continue;
        }

        let file = AtomicJsonFile::<StoredEntry<T>>::new(path);
        match file.load() {
            Ok(Some(entry)) if entry.is_expired(ttl, now) => {
                file.remove()?;
                evicted += 1;
            }
            Ok(Some(entry)) => live.push(entry),
            // Removed concurrently, or an empty file mid-write
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %file.path().display(), "skipping unreadable record: {}", e);
            }
        }
    }

    Ok((live, evicted))
}

/// Removes a namespace directory that holds no records.
///
/// Leftover lock files are cleared first; if a record appears concurrently
/// the final `remove_dir` fails and the namespace is kept.
fn remove_empty_namespace(dir: &Path) -> bool {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return false;
    };
    for dir_entry in read_dir.flatten() {
        let path = dir_entry.path();
        if is_record_file(&path) {
            return false;
        }
        if path.extension().is_some_and(|ext| ext == "lock") {
            let _ = fs::remove_file(&path);
        }
    }
    match fs::remove_dir(dir) {
        Ok(()) => {
            tracing::debug!(dir = %dir.display(), "removed empty namespace");
            true
        }
        Err(e) => {
            tracing::debug!(dir = %dir.display(), "keeping namespace: {}", e);
            false
        }
    }
}

fn is_record_file(path: &Path) -> bool {
    path.is_file()
        && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION)
        && !path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// Keys and namespaces become path segments, so only `[A-Za-z0-9_-]` is allowed.
fn validate_segment(what: &str, segment: &str) -> Result<()> {
    let valid = !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(SanctionError::validation(format!(
            "invalid storage {} '{}'",
            what, segment
        )))
    }
}

async fn blocking<R, F>(f: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SanctionError::internal(format!("Failed to join storage task: {}", e)))?
}
