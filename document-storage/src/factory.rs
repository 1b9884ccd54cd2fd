use std::sync::Arc;

use tracing::info;

use crate::blob_store::ObjectStoreStorage;
use crate::config::{StorageBackend, StorageConfig};
use crate::traits::{ObjectStorage, StorageError, StorageResult};

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStorage>> {
    info!(backend = ?config.backend, "Creating object storage");

    match config.backend {
        StorageBackend::S3 => {
            if config.bucket.trim().is_empty() {
                return Err(StorageError::config("STORAGE_BUCKET not configured"));
            }
            Ok(Arc::new(ObjectStoreStorage::s3(config)?))
        }
        StorageBackend::Local => {
            let storage =
                ObjectStoreStorage::local(config.local_root.clone(), config.request_timeout)
                    .await?;
            Ok(Arc::new(storage))
        }
        StorageBackend::Memory => Ok(Arc::new(ObjectStoreStorage::in_memory())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_create_memory_storage() {
        let storage = create_storage(&StorageConfig::memory()).await.unwrap();
        storage
            .store(Bytes::from_static(b"abc"), 3, "text/plain", "a.txt")
            .await
            .unwrap();
        assert!(storage.exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_s3_requires_bucket() {
        let config = StorageConfig {
            bucket: " ".to_string(),
            ..StorageConfig::default()
        };
        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
