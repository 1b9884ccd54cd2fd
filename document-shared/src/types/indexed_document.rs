//! Search index projection of a document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::document::Document;

/// Document representation for the search index.
///
/// A denormalized projection of a `Document` plus its extracted text. It is
/// not a system of record and can always be rebuilt from the repository and
/// the object store. Every field has a default so that partially written
/// entries (for example a summary that arrived before the text) still decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexedDocument {
    pub document_id: String,
    pub filename: String,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub size: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl IndexedDocument {
    /// Project a document and its extracted text into an index entry.
    ///
    /// # Arguments
    ///
    /// * `document` - The metadata record
    /// * `text` - Text extracted from the stored content
    pub fn from_document(document: &Document, text: impl Into<String>) -> Self {
        Self {
            document_id: document.id.to_string(),
            filename: document.filename.clone(),
            content_type: document.content_type.clone(),
            uploaded_at: document.uploaded_at,
            size: document.size,
            text: text.into(),
            summary: document.summary.clone(),
        }
    }
}
