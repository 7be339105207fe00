//! Infrastructure layer for Sanction: file-backed stores, paths, configuration.

pub mod approval_result_repository;
pub mod config_service;
pub mod paths;
pub mod storage;
pub mod webhook_registry;

pub use crate::approval_result_repository::KvApprovalResultRepository;
pub use crate::config_service::ConfigService;
pub use crate::paths::{Partition, SanctionPaths};
pub use crate::storage::FileKvStore;
pub use crate::webhook_registry::KvWebhookRegistry;
