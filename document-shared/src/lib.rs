//! # Document Shared
//!
//! This crate defines the data structures shared across the document pipeline:
//! the `Document` and `Tag` records, the messages exchanged over the broker,
//! the projection pushed into the search index, and the storage key rules
//! that tie a document row to its object.

pub mod storage_key;
pub mod types;

pub use storage_key::{ocr_text_key, replacement_storage_key, sanitize_filename, storage_key};
pub use types::document::{Document, Tag};
pub use types::indexed_document::IndexedDocument;
pub use types::messages::{SummaryMessage, UploadEvent, ANONYMOUS_UPLOADER};
pub use types::search_result::SearchResult;
