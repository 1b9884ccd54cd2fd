//! Document service: the write path of the pipeline.
//!
//! Every mutation touches the object store first and the repository second, so
//! a failure never leaves a row pointing at missing content. Upload events are
//! published only after both writes have committed.

use std::sync::Arc;

use bytes::Bytes;
use document_broker::EventPublisher;
use document_repository::DocumentRepository;
use document_search::SearchIndexProvider;
use document_shared::{
    ocr_text_key, replacement_storage_key, storage_key, Document, UploadEvent, ANONYMOUS_UPLOADER,
};
use document_storage::ObjectStorage;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::errors::ServiceError;
use crate::requests::{ReplaceRequest, UpdateMetadataRequest, UploadRequest};

pub struct DocumentService {
    documents: Arc<dyn DocumentRepository>,
    storage: Arc<dyn ObjectStorage>,
    publisher: EventPublisher,
    search_index: Option<Arc<dyn SearchIndexProvider>>,
    config: ServiceConfig,
}

impl DocumentService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        storage: Arc<dyn ObjectStorage>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            documents,
            storage,
            publisher,
            search_index: None,
            config: ServiceConfig::default(),
        }
    }

    /// Remove index entries of deleted documents through `provider`.
    pub fn with_search_index(mut self, provider: Arc<dyn SearchIndexProvider>) -> Self {
        self.search_index = Some(provider);
        self
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    async fn find(&self, id: Uuid) -> Result<Document, ServiceError> {
        self.documents
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Document {} not found", id)))
    }

    /// Delete an object whose removal is not required for the call to succeed.
    async fn discard_object(&self, key: &str, reason: &str) {
        if let Err(e) = self.storage.delete(key).await {
            warn!(storage_key = %key, error = %e, reason, "Orphaned object left in storage");
        }
    }

    /// Publish the upload event for a committed document.
    ///
    /// The write has already succeeded, so a broker failure is logged and
    /// dropped; `republish` can re-drive the document later.
    async fn announce(&self, document: &Document) {
        if let Err(e) = self.publisher.publish(&UploadEvent::from_document(document)).await {
            error!(
                document_id = %document.id,
                error = %e,
                "Failed to publish upload event; document will not be processed until republished"
            );
        }
    }

    /// Store new content and its metadata record, then announce it.
    ///
    /// # Errors
    ///
    /// * `ValidationFailed` - Blank filename or content type, or a bad size
    /// * `StorageWriteFailed` - The object could not be written; no row exists
    /// * `Repository` - The row could not be written; the object is removed
    #[instrument(skip(self, request), fields(filename = %request.filename, size = request.size))]
    pub async fn upload(&self, request: UploadRequest) -> Result<Document, ServiceError> {
        request.validate(self.config.max_upload_bytes)?;

        let id = Uuid::new_v4();
        let key = storage_key(id, &request.filename);
        let uploaded_by = request
            .uploaded_by
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_UPLOADER.to_string());

        self.storage
            .store(request.bytes, request.size as u64, &request.content_type, &key)
            .await
            .map_err(|e| ServiceError::StorageWriteFailed(e.to_string()))?;

        let document = Document::new(
            id,
            request.filename,
            request.content_type,
            request.size,
            uploaded_by,
            key,
        );

        if let Err(e) = self.documents.insert(&document).await {
            self.discard_object(&document.storage_key, "metadata insert failed")
                .await;
            return Err(e.into());
        }

        info!(document_id = %document.id, storage_key = %document.storage_key, "Document uploaded");
        self.announce(&document).await;
        Ok(document)
    }

    /// Swap the content of a document.
    ///
    /// The new object is written under a fresh key before the row is updated;
    /// the old object is deleted last. The summary is cleared and the document
    /// goes through the pipeline again.
    #[instrument(skip(self, request), fields(filename = %request.filename, size = request.size))]
    pub async fn replace_file(
        &self,
        id: Uuid,
        request: ReplaceRequest,
    ) -> Result<Document, ServiceError> {
        let existing = self.find(id).await?;
        request.validate(self.config.max_upload_bytes)?;

        let new_key = replacement_storage_key(id, Uuid::new_v4(), &request.filename);
        self.storage
            .store(request.bytes, request.size as u64, &request.content_type, &new_key)
            .await
            .map_err(|e| ServiceError::StorageWriteFailed(e.to_string()))?;

        let replacement = Document {
            filename: request.filename,
            content_type: request.content_type,
            size: request.size,
            storage_key: new_key.clone(),
            summary: None,
            ..existing.clone()
        };

        let updated = match self.documents.update(&replacement, existing.version).await {
            Ok(updated) => updated,
            Err(e) => {
                // The key is private to this attempt, so no row references it
                self.discard_object(&new_key, "metadata update failed").await;
                return Err(e.into());
            }
        };

        if existing.storage_key != new_key {
            self.discard_object(&existing.storage_key, "replaced by new content")
                .await;
        }
        // The entry describes the old content; the upload consumer indexes the new one
        self.forget_indexed(id).await;

        info!(
            document_id = %id,
            version = updated.version,
            storage_key = %updated.storage_key,
            "Document content replaced"
        );
        self.announce(&updated).await;
        Ok(updated)
    }

    /// Change filename and content type without touching the stored content.
    #[instrument(skip(self, request))]
    pub async fn update_metadata(
        &self,
        id: Uuid,
        request: UpdateMetadataRequest,
    ) -> Result<Document, ServiceError> {
        let existing = self.find(id).await?;
        request.validate()?;

        let changed = Document {
            filename: request.filename.trim().to_string(),
            content_type: request.content_type.trim().to_string(),
            ..existing.clone()
        };
        let updated = self.documents.update(&changed, existing.version).await?;

        debug!(document_id = %id, version = updated.version, "Document metadata updated");
        Ok(updated)
    }

    /// Delete a document's content, record and derived data.
    ///
    /// # Errors
    ///
    /// * `NotFound` - Unknown id
    /// * `StorageDeleteFailed` - The object could not be removed; the row is kept
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let document = self.find(id).await?;

        self.storage
            .delete(&document.storage_key)
            .await
            .map_err(|e| ServiceError::StorageDeleteFailed(e.to_string()))?;

        if !self.documents.delete_by_id(id).await? {
            return Err(ServiceError::not_found(format!("Document {} not found", id)));
        }

        self.discard_object(&ocr_text_key(id), "extracted text of deleted document")
            .await;

        self.forget_indexed(id).await;

        info!(document_id = %id, "Document deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Document, ServiceError> {
        self.find(id).await
    }

    /// All documents, newest first.
    pub async fn list(&self) -> Result<Vec<Document>, ServiceError> {
        Ok(self.documents.find_all().await?)
    }

    /// Load a document together with its content.
    ///
    /// # Errors
    ///
    /// * `NotFound` - Unknown id, or the object is missing
    /// * `StorageReadFailed` - The object store failed
    pub async fn download(&self, id: Uuid) -> Result<(Document, Bytes), ServiceError> {
        let document = self.find(id).await?;
        let content = self
            .storage
            .load(&document.storage_key)
            .await
            .map_err(|e| ServiceError::StorageReadFailed(e.to_string()))?
            .ok_or_else(|| {
                ServiceError::not_found(format!("Content of document {} not found", id))
            })?;
        Ok((document, content))
    }

    /// Record the summary derived for a document (last write wins).
    ///
    /// A summary for an unknown document is stale and ignored.
    #[instrument(skip(self, summary))]
    pub async fn save_summary(&self, id: Uuid, summary: &str) -> Result<(), ServiceError> {
        if self.documents.update_summary(id, summary).await? {
            debug!(document_id = %id, "Summary saved");
        } else {
            warn!(document_id = %id, "Ignoring summary for unknown document");
        }
        Ok(())
    }

    /// Best-effort removal of a document's search index entry.
    async fn forget_indexed(&self, id: Uuid) {
        if let Some(index) = &self.search_index {
            if let Err(e) = index.delete_document(id).await {
                warn!(document_id = %id, error = %e, "Failed to remove document from search index");
            }
        }
    }

    /// Publish the upload event of an existing document again.
    ///
    /// # Errors
    ///
    /// * `NotFound` - Unknown id
    /// * `PublishFailed` - The broker did not accept the event
    #[instrument(skip(self))]
    pub async fn republish(&self, id: Uuid) -> Result<(), ServiceError> {
        let document = self.find(id).await?;
        self.publisher
            .publish(&UploadEvent::from_document(&document))
            .await?;
        info!(document_id = %id, "Upload event republished");
        Ok(())
    }
}
