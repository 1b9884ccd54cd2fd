//! Request and hit types exchanged with search index providers.

use std::collections::HashMap;

use document_shared::IndexedDocument;

/// Field names used in the index and in highlight maps.
pub const FIELD_TEXT: &str = "text";
pub const FIELD_FILENAME: &str = "filename";
pub const FIELD_SUMMARY: &str = "summary";

/// A full-text query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Free text matched against text, filename, and summary.
    pub text: String,
    /// Maximum number of hits to return.
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
        }
    }
}

/// One raw hit as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    /// The entry key, normally the document id.
    pub key: String,
    /// Relevance score; some backends omit it.
    pub score: Option<f64>,
    /// Stored source, absent when the backend returns no `_source`.
    pub source: Option<IndexedDocument>,
    /// Highlight fragments by field name, already wrapped in `<em>` tags.
    pub highlights: HashMap<String, Vec<String>>,
}

impl SearchHit {
    /// First highlight fragment for `field`, if any.
    pub fn first_highlight(&self, field: &str) -> Option<&str> {
        self.highlights
            .get(field)
            .and_then(|fragments| fragments.first())
            .map(String::as_str)
    }
}
