//! Search index provider trait definition.

use async_trait::async_trait;
use document_shared::IndexedDocument;
use uuid::Uuid;

use crate::errors::SearchIndexError;
use crate::types::{SearchHit, SearchQuery};

/// Abstracts the full-text index holding one entry per document.
///
/// Entries are keyed by the document id. Writes are upserts so the indexer
/// can be replayed after a redelivery without creating duplicates.
///
/// # Index Initialization
///
/// Call `ensure_index_exists` during startup, before the first write or query.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Ensure the search index exists with its mappings, creating it if necessary.
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError>;

    /// Create the entry for `document.document_id` or merge into the existing one.
    ///
    /// A `None` summary leaves a summary already stored on the entry untouched.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the entry was written
    /// * `Err(SearchIndexError)` - If the backend rejected the write
    async fn index_document(&self, document: &IndexedDocument) -> Result<(), SearchIndexError>;

    /// Set the summary field of an entry, creating a partial entry when none exists.
    async fn update_summary(&self, document_id: Uuid, summary: &str)
        -> Result<(), SearchIndexError>;

    /// Remove an entry. A missing entry counts as success.
    async fn delete_document(&self, document_id: Uuid) -> Result<(), SearchIndexError>;

    /// Run a full-text query over text, filename, and summary.
    ///
    /// Hits come back in backend relevance order, at most `query.limit` of them,
    /// with highlight fragments keyed by field name.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchIndexError>;
}
