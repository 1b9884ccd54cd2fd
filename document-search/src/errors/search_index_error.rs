//! Search index error types.

use thiserror::Error;

/// Errors from search index operations.
///
/// Returned by every `SearchIndexProvider` method. Callers on the query path
/// collapse all of them into `SearchError::SearchUnavailable`.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Failed to establish connection to the search index backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to index a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to update a document.
    #[error("Update error: {0}")]
    UpdateError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// The search request failed.
    #[error("Query error: {0}")]
    QueryError(String),

    /// Failed to parse response from search index backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The backend did not answer in time.
    #[error("Search index timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl SearchIndexError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create an update error.
    pub fn update(msg: impl Into<String>) -> Self {
        Self::UpdateError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}

/// Errors surfaced by `SearchService`.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The index backend failed or timed out.
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),
}

impl From<SearchIndexError> for SearchError {
    fn from(err: SearchIndexError) -> Self {
        Self::SearchUnavailable(err.to_string())
    }
}
