//! Tag service: tag lifecycle and document/tag associations.

use std::sync::Arc;

use document_repository::{DocumentRepository, TagRepository};
use document_shared::{Document, Tag};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::requests::TagRequest;

pub struct TagService {
    tags: Arc<dyn TagRepository>,
    documents: Arc<dyn DocumentRepository>,
}

impl TagService {
    pub fn new(tags: Arc<dyn TagRepository>, documents: Arc<dyn DocumentRepository>) -> Self {
        Self { tags, documents }
    }

    async fn document(&self, id: Uuid) -> Result<Document, ServiceError> {
        self.documents
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Document {} not found", id)))
    }

    async fn tag(&self, id: Uuid) -> Result<Tag, ServiceError> {
        self.tags
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Tag {} not found", id)))
    }

    /// Create a tag. Names are unique ignoring case.
    ///
    /// # Errors
    ///
    /// * `ValidationFailed` - Blank or overlong name, overlong color
    /// * `AlreadyExists` - A tag with the same name exists
    #[instrument(skip(self))]
    pub async fn create(&self, request: TagRequest) -> Result<Tag, ServiceError> {
        let (name, color) = request.normalized()?;

        if let Some(existing) = self.tags.find_by_name_ignore_case(&name).await? {
            return Err(ServiceError::already_exists(format!(
                "Tag already exists: {}",
                existing.name
            )));
        }

        let tag = Tag::new(name, color);
        // A concurrent create surfaces as Duplicate, mapped to AlreadyExists
        self.tags.save(&tag).await?;

        info!(tag_id = %tag.id, name = %tag.name, "Tag created");
        Ok(tag)
    }

    /// All tags ordered by name.
    pub async fn list_all(&self) -> Result<Vec<Tag>, ServiceError> {
        Ok(self.tags.find_all().await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, tag_id: Uuid) -> Result<(), ServiceError> {
        if !self.tags.delete_by_id(tag_id).await? {
            return Err(ServiceError::not_found(format!("Tag {} not found", tag_id)));
        }
        info!(tag_id = %tag_id, "Tag deleted");
        Ok(())
    }

    /// Associate a tag with a document. Adding it twice is a no-op.
    #[instrument(skip(self))]
    pub async fn add_tag_to_document(
        &self,
        document_id: Uuid,
        tag_id: Uuid,
    ) -> Result<Document, ServiceError> {
        self.document(document_id).await?;
        self.tag(tag_id).await?;

        let added = self.documents.add_tag(document_id, tag_id).await?;
        debug!(document_id = %document_id, tag_id = %tag_id, added, "Tag added to document");

        self.document(document_id).await
    }

    /// Remove a tag from a document. Removing an absent association is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_tag_from_document(
        &self,
        document_id: Uuid,
        tag_id: Uuid,
    ) -> Result<Document, ServiceError> {
        self.document(document_id).await?;
        self.tag(tag_id).await?;

        let removed = self.documents.remove_tag(document_id, tag_id).await?;
        debug!(document_id = %document_id, tag_id = %tag_id, removed, "Tag removed from document");

        self.document(document_id).await
    }

    pub async fn tags_for_document(&self, document_id: Uuid) -> Result<Vec<Tag>, ServiceError> {
        self.document(document_id).await?;
        Ok(self.tags.find_by_document(document_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_repository::InMemoryDocumentStore;

    async fn setup() -> (TagService, InMemoryDocumentStore, Document) {
        let store = InMemoryDocumentStore::new();
        let document = Document::new(Uuid::new_v4(), "a.txt", "text/plain", 1, "alice", "key");
        store.insert(&document).await.unwrap();
        let service = TagService::new(Arc::new(store.clone()), Arc::new(store.clone()));
        (service, store, document)
    }

    #[tokio::test]
    async fn test_create_trims_name() {
        let (service, _, _) = setup().await;
        let tag = service
            .create(TagRequest::new("  Finance ").with_color("green"))
            .await
            .unwrap();
        assert_eq!(tag.name, "Finance");
        assert_eq!(tag.color.as_deref(), Some("green"));
        assert_eq!(service.list_all().await.unwrap(), vec![tag]);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid() {
        let (service, _, _) = setup().await;
        assert!(matches!(
            service.create(TagRequest::new("")).await,
            Err(ServiceError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_add_and_remove_are_idempotent() {
        let (service, _, document) = setup().await;
        let tag = service.create(TagRequest::new("urgent")).await.unwrap();

        let tagged = service.add_tag_to_document(document.id, tag.id).await.unwrap();
        assert_eq!(tagged.tags, vec![tag.clone()]);
        let tagged = service.add_tag_to_document(document.id, tag.id).await.unwrap();
        assert_eq!(tagged.tags.len(), 1);

        assert_eq!(
            service.tags_for_document(document.id).await.unwrap(),
            vec![tag.clone()]
        );

        let untagged = service
            .remove_tag_from_document(document.id, tag.id)
            .await
            .unwrap();
        assert!(untagged.tags.is_empty());
        let untagged = service
            .remove_tag_from_document(document.id, tag.id)
            .await
            .unwrap();
        assert!(untagged.tags.is_empty());
    }

    #[tokio::test]
    async fn test_missing_sides_are_not_found() {
        let (service, _, document) = setup().await;
        let tag = service.create(TagRequest::new("urgent")).await.unwrap();

        assert!(matches!(
            service.add_tag_to_document(Uuid::new_v4(), tag.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.add_tag_to_document(document.id, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.remove_tag_from_document(document.id, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.tags_for_document(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_tag() {
        let (service, _, document) = setup().await;
        let tag = service.create(TagRequest::new("urgent")).await.unwrap();
        service.add_tag_to_document(document.id, tag.id).await.unwrap();

        service.delete(tag.id).await.unwrap();

        assert!(service.list_all().await.unwrap().is_empty());
        assert!(service.tags_for_document(document.id).await.unwrap().is_empty());
        assert!(matches!(
            service.delete(tag.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
