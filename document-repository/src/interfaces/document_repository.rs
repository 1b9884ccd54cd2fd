use async_trait::async_trait;
use document_shared::Document;
use uuid::Uuid;

use crate::errors::RepositoryError;

/// Trait for interacting with the document store.
///
/// The repository is the only safety net for concurrent writes to the same
/// document: `update` is an optimistic compare-and-swap on `version`.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document row. The document's tags are ignored.
    async fn insert(&self, document: &Document) -> Result<(), RepositoryError>;

    /// Find a document by id, including its tags.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, RepositoryError>;

    /// List all documents, newest first.
    async fn find_all(&self) -> Result<Vec<Document>, RepositoryError>;

    /// Persist filename, content type, size, storage key and summary of `document`.
    ///
    /// The update only applies if the stored version equals `expected_version`;
    /// the stored version is then incremented and the updated document returned.
    ///
    /// # Returns
    ///
    /// * `Ok(Document)` - The document as stored after the update
    /// * `Err(RepositoryError::NotFound)` - If the row does not exist
    /// * `Err(RepositoryError::VersionConflict)` - If another writer got there first
    async fn update(
        &self,
        document: &Document,
        expected_version: i64,
    ) -> Result<Document, RepositoryError>;

    /// Delete a document row. Returns false if there was nothing to delete.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Overwrite the summary of a document (last write wins).
    ///
    /// Returns false if the document does not exist.
    async fn update_summary(&self, id: Uuid, summary: &str) -> Result<bool, RepositoryError>;

    /// Associate a tag with a document.
    ///
    /// Returns true if the association was created, false if it already existed.
    async fn add_tag(&self, document_id: Uuid, tag_id: Uuid) -> Result<bool, RepositoryError>;

    /// Remove a tag from a document.
    ///
    /// Returns true if an association was removed, false if there was none.
    async fn remove_tag(&self, document_id: Uuid, tag_id: Uuid) -> Result<bool, RepositoryError>;
}
