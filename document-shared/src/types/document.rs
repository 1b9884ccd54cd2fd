//! Document and tag records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored file plus its metadata record.
///
/// The `id` is generated once at upload time and doubles as the prefix of the
/// `storage_key`, so the row and the object always agree on which bytes belong
/// to which record.
///
/// # Fields
///
/// - `id`: Unique identifier, shared with the storage object name
/// - `filename`: Original display name (untrusted, never used as a key directly)
/// - `content_type`: MIME type supplied with the upload
/// - `size`: Size of the content in bytes
/// - `uploaded_at`: Timestamp of the upload
/// - `uploaded_by`: Opaque uploader identity
/// - `storage_key`: Key of the object holding the content
/// - `summary`: Derived summary, populated asynchronously
/// - `tags`: Associated tags (set semantics, ordered by name)
/// - `version`: Optimistic concurrency counter, incremented on every update
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    pub storage_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub version: i64,
}

impl Document {
    /// Version assigned to a freshly inserted document.
    pub const INITIAL_VERSION: i64 = 1;

    /// Create a new document record with no summary and no tags.
    ///
    /// # Arguments
    ///
    /// * `id` - The identifier generated for this upload
    /// * `filename` - The original filename
    /// * `content_type` - The MIME type of the content
    /// * `size` - Size of the content in bytes
    /// * `uploaded_by` - Opaque uploader identity
    /// * `storage_key` - Key of the stored object
    pub fn new(
        id: Uuid,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        size: i64,
        uploaded_by: impl Into<String>,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            id,
            filename: filename.into(),
            content_type: content_type.into(),
            size,
            uploaded_at: Utc::now(),
            uploaded_by: uploaded_by.into(),
            storage_key: storage_key.into(),
            summary: None,
            tags: Vec::new(),
            version: Self::INITIAL_VERSION,
        }
    }

    /// Returns true if the tag is associated with this document.
    pub fn has_tag(&self, tag_id: Uuid) -> bool {
        self.tags.iter().any(|t| t.id == tag_id)
    }
}

/// A label that can be attached to any number of documents.
///
/// Names are unique case-insensitively; `Urgent` and `urgent` are the same tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Tag {
    /// Create a new tag with a generated identifier.
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            color,
        }
    }
}
