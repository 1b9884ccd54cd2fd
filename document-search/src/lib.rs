//! # Document Search
//!
//! Full-text search over documents. It includes the `SearchIndexProvider`
//! interface with OpenSearch and in-memory implementations, and the
//! `SearchService` that turns raw hits into `SearchResult`s with tag-free
//! snippets.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod service;
pub mod types;

pub use config::{SearchConfig, DEFAULT_RESULT_LIMIT};
pub use errors::{SearchError, SearchIndexError};
pub use interfaces::SearchIndexProvider;
pub use memory::InMemorySearchIndex;
pub use opensearch::OpenSearchProvider;
pub use service::{build_snippet, SearchService, SNIPPET_MAX_CHARS};
pub use types::{SearchHit, SearchQuery};
