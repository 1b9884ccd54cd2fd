//! In-memory implementation of both repositories.
//!
//! Used by tests and by local runs without a database. It mirrors the
//! PostgreSQL constraints: version-checked updates, case-insensitive tag
//! uniqueness, cascading deletes and set semantics for associations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use document_shared::{Document, Tag};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::interfaces::{DocumentRepository, TagRepository};

#[derive(Default)]
struct State {
    documents: HashMap<Uuid, Document>,
    tags: HashMap<Uuid, Tag>,
    links: HashSet<(Uuid, Uuid)>,
}

impl State {
    fn tags_of(&self, document_id: Uuid) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self
            .links
            .iter()
            .filter(|(doc, _)| *doc == document_id)
            .filter_map(|(_, tag)| self.tags.get(tag).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    fn with_tags(&self, document: &Document) -> Document {
        let mut document = document.clone();
        document.tags = self.tags_of(document.id);
        document
    }
}

/// Document and tag store held in process memory.
///
/// Cloning shares the underlying state, so one instance can be handed out
/// as both `Arc<dyn DocumentRepository>` and `Arc<dyn TagRepository>`.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentStore {
    async fn insert(&self, document: &Document) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;

        if state.documents.contains_key(&document.id) {
            return Err(RepositoryError::duplicate(format!("document {}", document.id)));
        }
        if state
            .documents
            .values()
            .any(|d| d.storage_key == document.storage_key)
        {
            return Err(RepositoryError::duplicate(format!(
                "storage key {}",
                document.storage_key
            )));
        }

        let mut stored = document.clone();
        stored.tags.clear();
        state.documents.insert(stored.id, stored);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.documents.get(&id).map(|d| state.with_tags(d)))
    }

    async fn find_all(&self) -> Result<Vec<Document>, RepositoryError> {
        let state = self.state.read().await;
        let mut documents: Vec<Document> =
            state.documents.values().map(|d| state.with_tags(d)).collect();
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }

    async fn update(
        &self,
        document: &Document,
        expected_version: i64,
    ) -> Result<Document, RepositoryError> {
        let mut state = self.state.write().await;

        let stored = state
            .documents
            .get_mut(&document.id)
            .ok_or_else(|| RepositoryError::not_found(format!("document {}", document.id)))?;

        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                id: document.id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        stored.filename = document.filename.clone();
        stored.content_type = document.content_type.clone();
        stored.size = document.size;
        stored.storage_key = document.storage_key.clone();
        stored.summary = document.summary.clone();
        stored.version += 1;

        let updated = stored.clone();
        Ok(state.with_tags(&updated))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let removed = state.documents.remove(&id).is_some();
        state.links.retain(|(doc, _)| *doc != id);
        Ok(removed)
    }

    async fn update_summary(&self, id: Uuid, summary: &str) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.documents.get_mut(&id) {
            Some(document) => {
                document.summary = Some(summary.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_tag(&self, document_id: Uuid, tag_id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.documents.contains_key(&document_id) || !state.tags.contains_key(&tag_id) {
            return Err(RepositoryError::not_found(format!(
                "document {} or tag {}",
                document_id, tag_id
            )));
        }
        Ok(state.links.insert((document_id, tag_id)))
    }

    async fn remove_tag(&self, document_id: Uuid, tag_id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.links.remove(&(document_id, tag_id)))
    }
}

#[async_trait]
impl TagRepository for InMemoryDocumentStore {
    async fn save(&self, tag: &Tag) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let lowered = tag.name.to_lowercase();
        if state
            .tags
            .values()
            .any(|t| t.id == tag.id || t.name.to_lowercase() == lowered)
        {
            return Err(RepositoryError::duplicate(format!("tag '{}'", tag.name)));
        }
        state.tags.insert(tag.id, tag.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tag>, RepositoryError> {
        Ok(self.state.read().await.tags.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Tag>, RepositoryError> {
        let state = self.state.read().await;
        let mut tags: Vec<Tag> = state.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn find_by_name_ignore_case(&self, name: &str) -> Result<Option<Tag>, RepositoryError> {
        let lowered = name.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .tags
            .values()
            .find(|t| t.name.to_lowercase() == lowered)
            .cloned())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let removed = state.tags.remove(&id).is_some();
        state.links.retain(|(_, tag)| *tag != id);
        Ok(removed)
    }

    async fn find_by_document(&self, document_id: Uuid) -> Result<Vec<Tag>, RepositoryError> {
        Ok(self.state.read().await.tags_of(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(name: &str) -> Document {
        let id = Uuid::new_v4();
        Document::new(
            id,
            name.to_string(),
            "text/plain".to_string(),
            4,
            "alice".to_string(),
            document_shared::storage_key(id, name),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryDocumentStore::new();
        let doc = document("a.txt");
        DocumentRepository::insert(&store, &doc).await.unwrap();

        let found = DocumentRepository::find_by_id(&store, doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.filename, "a.txt");
        assert_eq!(found.version, 1);
        assert!(DocumentRepository::find_by_id(&store, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_storage_key_rejected() {
        let store = InMemoryDocumentStore::new();
        let doc = document("a.txt");
        store.insert(&doc).await.unwrap();

        let mut other = document("b.txt");
        other.storage_key = doc.storage_key.clone();
        let result = store.insert(&other).await;
        assert!(matches!(result, Err(RepositoryError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_update_increments_version() {
        let store = InMemoryDocumentStore::new();
        let mut doc = document("a.txt");
        store.insert(&doc).await.unwrap();

        doc.filename = "renamed.txt".to_string();
        let updated = store.update(&doc, 1).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.filename, "renamed.txt");
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let store = InMemoryDocumentStore::new();
        let doc = document("a.txt");
        store.insert(&doc).await.unwrap();
        store.update(&doc, 1).await.unwrap();

        let result = store.update(&doc, 1).await;
        match result {
            Err(RepositoryError::VersionConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected version conflict, got {:?}", other.map(|d| d.id)),
        }
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let result = store.update(&document("ghost.txt"), 1).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_all_newest_first() {
        let store = InMemoryDocumentStore::new();
        let mut older = document("old.txt");
        older.uploaded_at = older.uploaded_at - chrono::Duration::minutes(5);
        let newer = document("new.txt");
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();

        let all = DocumentRepository::find_all(&store).await.unwrap();
        assert_eq!(all[0].filename, "new.txt");
        assert_eq!(all[1].filename, "old.txt");
    }

    #[tokio::test]
    async fn test_tag_names_unique_ignoring_case() {
        let store = InMemoryDocumentStore::new();
        store
            .save(&Tag::new("Urgent".to_string(), None))
            .await
            .unwrap();

        let result = store.save(&Tag::new("urgent".to_string(), None)).await;
        assert!(matches!(result, Err(RepositoryError::Duplicate(_))));

        let found = store.find_by_name_ignore_case("URGENT").await.unwrap();
        assert_eq!(found.map(|t| t.name), Some("Urgent".to_string()));
    }

    #[tokio::test]
    async fn test_association_has_set_semantics() {
        let store = InMemoryDocumentStore::new();
        let doc = document("a.txt");
        let tag = Tag::new("finance".to_string(), Some("#00ff00".to_string()));
        store.insert(&doc).await.unwrap();
        store.save(&tag).await.unwrap();

        assert!(store.add_tag(doc.id, tag.id).await.unwrap());
        assert!(!store.add_tag(doc.id, tag.id).await.unwrap());

        let found = DocumentRepository::find_by_id(&store, doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.tags.len(), 1);

        assert!(store.remove_tag(doc.id, tag.id).await.unwrap());
        assert!(!store.remove_tag(doc.id, tag.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_tag_to_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let tag = Tag::new("finance".to_string(), None);
        store.save(&tag).await.unwrap();

        let result = store.add_tag(Uuid::new_v4(), tag.id).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deleting_tag_removes_associations() {
        let store = InMemoryDocumentStore::new();
        let doc = document("a.txt");
        let tag = Tag::new("finance".to_string(), None);
        store.insert(&doc).await.unwrap();
        store.save(&tag).await.unwrap();
        store.add_tag(doc.id, tag.id).await.unwrap();

        assert!(TagRepository::delete_by_id(&store, tag.id).await.unwrap());
        assert!(store.find_by_document(doc.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_summary_last_write_wins() {
        let store = InMemoryDocumentStore::new();
        let doc = document("a.txt");
        store.insert(&doc).await.unwrap();

        assert!(store.update_summary(doc.id, "first").await.unwrap());
        assert!(store.update_summary(doc.id, "second").await.unwrap());
        assert!(!store.update_summary(Uuid::new_v4(), "x").await.unwrap());

        let found = DocumentRepository::find_by_id(&store, doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.summary.as_deref(), Some("second"));
    }
}
