//! One JSON record per file, replaced atomically.
//!
//! The building block of `FileKvStore`: every stored record is a separate
//! file, so writers to different keys never contend.

use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write as IoWrite};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomicJsonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("lock error: {0}")]
    Lock(String),
}

impl From<AtomicJsonError> for sanction_core::SanctionError {
    fn from(e: AtomicJsonError) -> Self {
        match e {
            AtomicJsonError::Io(e) => e.into(),
            AtomicJsonError::Json(e) => e.into(),
            AtomicJsonError::Lock(message) => sanction_core::SanctionError::storage(message),
        }
    }
}

/// A handle to a JSON file that is replaced atomically.
///
/// Provides:
/// - **Atomicity**: Writes go to a uniquely named temp file, then rename
/// - **Durability**: Explicit fsync before rename
/// - **Isolation**: `with_lock` serializes read-modify-write sequences
///
/// Plain `save` does not lock: concurrent saves to one path resolve as
/// last-rename-wins, and readers never observe a partial file.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicJsonError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Saves data atomically, creating the parent directory if needed.
    ///
    /// The parent may be removed by a concurrent sweep of an emptied
    /// namespace; a write that hits NotFound recreates it and retries once.
    pub fn save(&self, data: &T) -> Result<(), AtomicJsonError> {
        let json = serde_json::to_string_pretty(data)?;

        match self.write_replace(&json) {
            Err(AtomicJsonError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "parent vanished mid-write, retrying");
                self.write_replace(&json)
            }
            result => result,
        }
    }

    fn write_replace(&self, json: &str) -> Result<(), AtomicJsonError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.temp_path()?;
        let write_result = (|| -> Result<(), AtomicJsonError> {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(json.as_bytes())?;
            tmp_file.sync_all()?;
            drop(tmp_file);
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();

        if write_result.is_err() {
            // Best effort: don't leave the temp file behind
            let _ = fs::remove_file(&tmp_path);
        }
        write_result
    }

    /// Removes the file and its lock file.
    ///
    /// Returns `true` if the data file existed.
    pub fn remove(&self) -> Result<bool, AtomicJsonError> {
        let existed = match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        let _ = fs::remove_file(self.lock_path());
        Ok(existed)
    }

    /// Runs `f` while holding an exclusive lock on this file.
    ///
    /// Only other `with_lock` callers are excluded; use it for
    /// read-modify-write sequences such as create-if-absent.
    pub fn with_lock<R, F>(&self, f: F) -> Result<R, AtomicJsonError>
    where
        F: FnOnce(&Self) -> Result<R, AtomicJsonError>,
    {
        let _lock = FileLock::acquire(&self.lock_path())?;
        f(self)
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicJsonError> {
        let parent = self.path.parent().ok_or_else(|| {
            AtomicJsonError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })?;

        let file_name = self.path.file_name().ok_or_else(|| {
            AtomicJsonError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "Path has no file name",
            ))
        })?;

        let tmp_name = format!(
            ".{}.{}.tmp",
            file_name.to_string_lossy(),
            uuid::Uuid::new_v4().simple()
        );
        Ok(parent.join(tmp_name))
    }
}

/// Exclusive lock held for the guard's lifetime.
///
/// The lock file is left in place on drop; unlinking it would let a second
/// locker lock a fresh inode while a waiter still holds the old one.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(lock_path: &Path) -> Result<Self, AtomicJsonError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        fs2::FileExt::lock_exclusive(&file)
            .map_err(|e| AtomicJsonError::Lock(format!("Failed to acquire lock: {}", e)))?;

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
