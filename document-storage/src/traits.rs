//! Storage abstraction trait
//!
//! This module defines the `ObjectStorage` trait that all storage backends implement,
//! along with the error type shared by every backend.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Content type recorded when the caller does not supply one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an invalid key error.
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Every operation is keyed by a storage key scoped to a single configured
/// bucket or root. Absence is expressed through the return types rather than
/// errors: `load` returns `None` and `exists` returns `false` for a missing
/// object, and deleting a missing object succeeds.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key`.
    ///
    /// # Arguments
    ///
    /// * `data` - The content to store
    /// * `size` - Declared size in bytes; must match `data.len()`
    /// * `content_type` - MIME type recorded with the object where supported
    /// * `key` - The storage key
    async fn store(
        &self,
        data: Bytes,
        size: u64,
        content_type: &str,
        key: &str,
    ) -> StorageResult<()>;

    /// Load the object stored under `key`, or `None` if there is none.
    async fn load(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Delete the object stored under `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Returns true if an object is stored under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Validate a storage key before it reaches a backend.
///
/// Keys must be non-empty, must not start with `/`, must not contain `.` or
/// `..` segments, empty segments, backslashes or control characters.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key("Storage key is empty"));
    }

    if key.starts_with('/') {
        return Err(StorageError::invalid_key(format!(
            "Storage key '{}' must not start with '/'",
            key
        )));
    }

    if key.chars().any(|c| c.is_control() || c == '\\') {
        return Err(StorageError::invalid_key(format!(
            "Storage key '{}' contains invalid characters",
            key.escape_debug()
        )));
    }

    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::invalid_key(format!(
            "Storage key '{}' contains an invalid path segment",
            key
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_accepts_document_keys() {
        assert!(validate_key("550e8400-e29b-41d4-a716-446655440000-report1.pdf").is_ok());
        assert!(validate_key("ocr/550e8400-e29b-41d4-a716-446655440000.txt").is_ok());
    }

    #[test]
    fn test_validate_key_rejects_invalid_keys() {
        let cases = vec![
            ("", "empty"),
            ("/absolute", "leading slash"),
            ("../escape", "parent segment"),
            ("a/../b", "inner parent segment"),
            ("./here", "current segment"),
            ("a//b", "empty segment"),
            ("trailing/", "trailing slash"),
            ("back\\slash", "backslash"),
            ("null\u{0}byte", "control character"),
            ("new\nline", "newline"),
        ];

        for (key, description) in cases {
            let result = validate_key(key);
            assert!(
                matches!(result, Err(StorageError::InvalidKey(_))),
                "Expected InvalidKey for {:?} ({})",
                key,
                description
            );
        }
    }
}
