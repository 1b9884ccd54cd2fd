//! Search result types.
//!
//! This module defines the query-time projection returned from searches.
//! Results are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single search result item.
///
/// Contains the document metadata along with a tag-free snippet and the
/// relevance score from the search engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// The document identifier, or `None` when the index key was malformed.
    pub id: Option<Uuid>,

    /// Original filename of the document.
    pub filename: String,

    /// MIME type of the document.
    pub content_type: String,

    /// Upload timestamp, if the index entry carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,

    /// Short excerpt of the matched content, free of HTML tags.
    pub snippet: String,

    /// Relevance score from the search engine.
    /// Higher scores indicate better matches.
    pub score: f64,
}
