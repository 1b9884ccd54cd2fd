//! Configuration for the document service.

use std::env;

/// Largest accepted upload: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: i64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Uploads and replacements larger than this are rejected.
    pub max_upload_bytes: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Create a ServiceConfig from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MAX_UPLOAD_BYTES` (default: 52428800)
    pub fn from_env() -> Self {
        Self {
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}
