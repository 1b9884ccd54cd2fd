//! `ObjectStorage` implementation backed by the `object_store` crate.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
};
use tracing::{debug, error, info};

use crate::config::StorageConfig;
use crate::traits::{validate_key, ObjectStorage, StorageError, StorageResult, DEFAULT_CONTENT_TYPE};

/// Object storage over any `object_store` backend.
///
/// Every request is bounded by `request_timeout`; a request that exceeds it
/// fails with the error variant of the operation it belongs to.
#[derive(Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    backend: &'static str,
    content_type_attributes: bool,
    request_timeout: Duration,
}

impl ObjectStoreStorage {
    /// Wrap an existing object store.
    ///
    /// # Arguments
    ///
    /// * `store` - The underlying object store
    /// * `backend` - Short backend name used in logs
    /// * `request_timeout` - Upper bound for a single request
    pub fn new(store: Arc<dyn ObjectStore>, backend: &'static str, request_timeout: Duration) -> Self {
        Self {
            store,
            backend,
            content_type_attributes: false,
            request_timeout,
        }
    }

    /// Create an in-memory store. Content is lost when the process exits.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemory::new()),
            "memory",
            StorageConfig::default().request_timeout,
        )
    }

    /// Create a store rooted at a local directory, creating it if necessary.
    pub async fn local(root: impl Into<PathBuf>, request_timeout: Duration) -> StorageResult<Self> {
        let root = root.into();

        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::config(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(|e| StorageError::config(e.to_string()))?;

        info!(root = %root.display(), "Created local filesystem storage");

        Ok(Self::new(Arc::new(store), "local", request_timeout))
    }

    /// Create a store for an S3-compatible service.
    ///
    /// Settings not present in `config` are taken from the standard AWS
    /// environment variables.
    pub fn s3(config: &StorageConfig) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone());

        if let Some(ref endpoint) = config.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            builder = builder
                .with_access_key_id(access_key.clone())
                .with_secret_access_key(secret_key.clone());
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::config(e.to_string()))?;

        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Created S3 storage"
        );

        let mut storage = Self::new(Arc::new(store), "s3", config.request_timeout);
        storage.content_type_attributes = true;
        Ok(storage)
    }

    /// Run a storage request under the configured timeout.
    async fn bounded<T, F>(&self, request: F) -> Result<object_store::Result<T>, String>
    where
        F: Future<Output = object_store::Result<T>>,
    {
        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| format!("request timed out after {:?}", self.request_timeout))
    }

    fn put_options(&self, content_type: &str) -> PutOptions {
        if !self.content_type_attributes {
            return PutOptions::default();
        }

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        PutOptions::from(attributes)
    }
}

fn location(key: &str) -> StorageResult<Path> {
    validate_key(key)?;
    Path::parse(key).map_err(|e| StorageError::invalid_key(e.to_string()))
}

#[async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn store(
        &self,
        data: Bytes,
        size: u64,
        content_type: &str,
        key: &str,
    ) -> StorageResult<()> {
        let location = location(key)?;

        if data.len() as u64 != size {
            return Err(StorageError::InvalidInput(format!(
                "Declared size {} does not match content length {}",
                size,
                data.len()
            )));
        }

        let content_type = if content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };

        let start = Instant::now();
        let options = self.put_options(content_type);
        let result = self
            .bounded(self.store.put_opts(&location, PutPayload::from(data), options))
            .await;

        match result {
            Ok(Ok(_)) => {
                info!(
                    backend = self.backend,
                    key = %key,
                    size_bytes = size,
                    content_type = %content_type,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Stored object"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                error!(backend = self.backend, key = %key, error = %e, "Store failed");
                Err(StorageError::UploadFailed(e.to_string()))
            }
            Err(timeout) => {
                error!(backend = self.backend, key = %key, error = %timeout, "Store failed");
                Err(StorageError::UploadFailed(timeout))
            }
        }
    }

    async fn load(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let location = location(key)?;
        let start = Instant::now();

        let fetch = async {
            let result = self.store.get(&location).await?;
            result.bytes().await
        };

        match self.bounded(fetch).await {
            Ok(Ok(bytes)) => {
                debug!(
                    backend = self.backend,
                    key = %key,
                    size_bytes = bytes.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Loaded object"
                );
                Ok(Some(bytes))
            }
            Ok(Err(ObjectStoreError::NotFound { .. })) => {
                debug!(backend = self.backend, key = %key, "Object not found");
                Ok(None)
            }
            Ok(Err(e)) => {
                error!(backend = self.backend, key = %key, error = %e, "Load failed");
                Err(StorageError::DownloadFailed(e.to_string()))
            }
            Err(timeout) => {
                error!(backend = self.backend, key = %key, error = %timeout, "Load failed");
                Err(StorageError::DownloadFailed(timeout))
            }
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = location(key)?;

        match self.bounded(self.store.delete(&location)).await {
            Ok(Ok(())) | Ok(Err(ObjectStoreError::NotFound { .. })) => {
                info!(backend = self.backend, key = %key, "Deleted object");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(backend = self.backend, key = %key, error = %e, "Delete failed");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
            Err(timeout) => {
                error!(backend = self.backend, key = %key, error = %timeout, "Delete failed");
                Err(StorageError::DeleteFailed(timeout))
            }
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = location(key)?;

        match self.bounded(self.store.head(&location)).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(ObjectStoreError::NotFound { .. })) => Ok(false),
            Ok(Err(e)) => Err(StorageError::BackendError(e.to_string())),
            Err(timeout) => Err(StorageError::BackendError(timeout)),
        }
    }
}
