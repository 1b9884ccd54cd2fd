//! Error types for the search crate.

mod search_index_error;

pub use search_index_error::{SearchError, SearchIndexError};
