//! Interface definitions for the search index provider.
//!
//! The `SearchIndexProvider` trait lets the indexer and the query path share
//! one backend while tests swap in an in-memory index or a mock.

mod search_index_provider;

pub use search_index_provider::SearchIndexProvider;
