//! # Document Storage
//!
//! Object store adapter for document content. The pipeline only needs four
//! capabilities from a blob store (`store`, `load`, `delete`, `exists`), which
//! the [`ObjectStorage`] trait captures. [`ObjectStoreStorage`] implements it
//! on top of the `object_store` crate for S3-compatible services (MinIO, AWS),
//! the local filesystem, and an in-memory store.
//!
//! The backend is chosen once at startup from a [`StorageConfig`] via
//! [`create_storage`].

pub mod blob_store;
pub mod config;
pub mod factory;
pub mod traits;

pub use blob_store::ObjectStoreStorage;
pub use config::{StorageBackend, StorageConfig};
pub use factory::create_storage;
pub use traits::{validate_key, ObjectStorage, StorageError, StorageResult, DEFAULT_CONTENT_TYPE};
