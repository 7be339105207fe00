//! Storage layer: atomic file primitive and the TTL key-value store.

mod atomic_json;
mod file_kv_store;
mod secret_storage;

pub use atomic_json::{AtomicJsonError, AtomicJsonFile};
pub use file_kv_store::FileKvStore;
pub use secret_storage::{SecretStorage, SecretStorageError};
