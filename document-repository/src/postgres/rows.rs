use chrono::{DateTime, Utc};
use document_shared::{Document, Tag};
use uuid::Uuid;

pub(crate) const DOCUMENT_COLUMNS: &str =
    "id, filename, content_type, size, uploaded_at, uploaded_by, storage_key, summary, version";

#[derive(sqlx::FromRow)]
pub(crate) struct DocumentRow {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    pub storage_key: String,
    pub summary: Option<String>,
    pub version: i64,
}

impl DocumentRow {
    pub fn into_document(self, tags: Vec<Tag>) -> Document {
        Document {
            id: self.id,
            filename: self.filename,
            content_type: self.content_type,
            size: self.size,
            uploaded_at: self.uploaded_at,
            uploaded_by: self.uploaded_by,
            storage_key: self.storage_key,
            summary: self.summary,
            tags,
            version: self.version,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TagRow {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: row.id,
            name: row.name,
            color: row.color,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DocumentTagRow {
    pub document_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
}
