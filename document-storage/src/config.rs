//! Storage configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::traits::StorageError;

/// Default bucket holding document content.
const DEFAULT_BUCKET: &str = "documents";

/// Default region passed to the S3 client.
const DEFAULT_REGION: &str = "us-east-1";

/// Default root directory for the local filesystem backend.
const DEFAULT_LOCAL_ROOT: &str = "./data/objects";

/// Default bound on a single storage request.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3-compatible object storage (AWS S3, MinIO).
    S3,
    /// Local filesystem rooted at `StorageConfig::local_root`.
    Local,
    /// Process-local in-memory store.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" | "minio" => Ok(Self::S3),
            "local" | "fs" | "filesystem" => Ok(Self::Local),
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            other => Err(StorageError::config(format!(
                "Unknown storage backend '{}'. Expected one of: s3, minio, local, memory",
                other
            ))),
        }
    }
}

/// Configuration for the object store adapter.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Which backend to use.
    pub backend: StorageBackend,
    /// Bucket name for the S3 backend.
    pub bucket: String,
    /// Region for the S3 backend.
    pub region: String,
    /// Custom endpoint for S3-compatible providers (e.g. "http://localhost:9000" for MinIO).
    pub endpoint: Option<String>,
    /// Access key for the S3 backend. Falls back to the AWS environment when unset.
    pub access_key_id: Option<String>,
    /// Secret key for the S3 backend.
    pub secret_access_key: Option<String>,
    /// Root directory for the local backend.
    pub local_root: PathBuf,
    /// Upper bound for a single storage request.
    pub request_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            local_root: PathBuf::from(DEFAULT_LOCAL_ROOT),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl StorageConfig {
    /// Configuration for the in-memory backend.
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Self::default()
        }
    }

    /// Configuration for the local filesystem backend rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Local,
            local_root: root.into(),
            ..Self::default()
        }
    }

    /// Create a StorageConfig from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `STORAGE_BACKEND` - `s3`, `minio`, `local` or `memory` (default: s3)
    /// - `STORAGE_BUCKET` - Bucket name (default: documents)
    /// - `STORAGE_REGION` - Region (default: us-east-1)
    /// - `STORAGE_ENDPOINT` - Custom S3 endpoint, e.g. a MinIO URL (optional)
    /// - `STORAGE_ACCESS_KEY` / `STORAGE_SECRET_KEY` - Credentials (optional)
    /// - `STORAGE_LOCAL_ROOT` - Root directory for the local backend (default: ./data/objects)
    /// - `STORAGE_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
    ///
    /// # Returns
    ///
    /// * `Ok(StorageConfig)` - The parsed configuration
    /// * `Err(StorageError)` - If `STORAGE_BACKEND` names an unknown backend
    pub fn from_env() -> Result<Self, StorageError> {
        let backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::S3,
        };

        let request_timeout = env::var("STORAGE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Self {
            backend,
            bucket: env::var("STORAGE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
            region: env::var("STORAGE_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            endpoint: env::var("STORAGE_ENDPOINT").ok(),
            access_key_id: env::var("STORAGE_ACCESS_KEY").ok(),
            secret_access_key: env::var("STORAGE_SECRET_KEY").ok(),
            local_root: env::var("STORAGE_LOCAL_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOCAL_ROOT)),
            request_timeout: Duration::from_secs(request_timeout),
        })
    }
}
