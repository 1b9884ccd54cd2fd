use async_trait::async_trait;
use document_shared::Tag;
use uuid::Uuid;

use crate::errors::RepositoryError;

/// Trait for interacting with the tag store.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Insert a new tag.
    ///
    /// Fails with `RepositoryError::Duplicate` if a tag with the same name,
    /// compared case-insensitively, already exists.
    async fn save(&self, tag: &Tag) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tag>, RepositoryError>;

    /// List all tags ordered by name.
    async fn find_all(&self) -> Result<Vec<Tag>, RepositoryError>;

    async fn find_by_name_ignore_case(&self, name: &str) -> Result<Option<Tag>, RepositoryError>;

    /// Delete a tag and all of its document associations.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// List the tags associated with a document, ordered by name.
    async fn find_by_document(&self, document_id: Uuid) -> Result<Vec<Tag>, RepositoryError>;
}
