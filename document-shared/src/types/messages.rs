//! Messages exchanged over the broker.
//!
//! Both messages are JSON with camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::document::Document;

/// Uploader identity recorded when none is supplied.
pub const ANONYMOUS_UPLOADER: &str = "anonymous";

/// Announces that a document's bytes and metadata are durably persisted.
///
/// Immutable once published. `document_id` is the idempotency key for all
/// downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    pub document_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
}

impl UploadEvent {
    /// Build the event announcing the given document.
    pub fn from_document(document: &Document) -> Self {
        let content_type = if document.content_type.trim().is_empty() {
            None
        } else {
            Some(document.content_type.clone())
        };

        let uploaded_by = if document.uploaded_by.trim().is_empty() {
            ANONYMOUS_UPLOADER.to_string()
        } else {
            document.uploaded_by.clone()
        };

        Self {
            document_id: document.id.to_string(),
            filename: document.filename.clone(),
            content_type,
            size: document.size,
            uploaded_at: document.uploaded_at,
            uploaded_by,
        }
    }

    /// Parse the document identifier carried by the event.
    pub fn document_uuid(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.document_id)
    }
}

/// Carries the summary derived for a document.
///
/// Consumed at-least-once; applying it twice leaves the same summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMessage {
    pub document_id: String,
    pub summary: String,
}

impl SummaryMessage {
    /// Create a summary message for the given document.
    pub fn new(document_id: Uuid, summary: impl Into<String>) -> Self {
        Self {
            document_id: document_id.to_string(),
            summary: summary.into(),
        }
    }

    /// Parse the document identifier carried by the message.
    pub fn document_uuid(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_event_from_document() {
        let doc = Document::new(Uuid::new_v4(), "a.txt", "text/plain", 3, "alice", "key");
        let event = UploadEvent::from_document(&doc);

        assert_eq!(event.document_id, doc.id.to_string());
        assert_eq!(event.filename, "a.txt");
        assert_eq!(event.content_type.as_deref(), Some("text/plain"));
        assert_eq!(event.size, 3);
        assert_eq!(event.uploaded_by, "alice");
        assert_eq!(event.document_uuid().unwrap(), doc.id);
    }

    #[test]
    fn test_upload_event_defaults_uploader_and_content_type() {
        let doc = Document::new(Uuid::new_v4(), "a.bin", "", 3, "", "key");
        let event = UploadEvent::from_document(&doc);

        assert_eq!(event.uploaded_by, ANONYMOUS_UPLOADER);
        assert!(event.content_type.is_none());
    }

    #[test]
    fn test_upload_event_wire_format() {
        let json = r#"{
            "documentId": "550e8400-e29b-41d4-a716-446655440000",
            "filename": "report 1.pdf",
            "contentType": null,
            "size": 1024,
            "uploadedAt": "2024-05-01T10:00:00Z",
            "uploadedBy": "anonymous"
        }"#;

        let event: UploadEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.filename, "report 1.pdf");
        assert!(event.content_type.is_none());
        assert_eq!(event.size, 1024);

        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("documentId").is_some());
        assert!(value.get("uploadedBy").is_some());
    }

    #[test]
    fn test_summary_message_wire_format() {
        let id = Uuid::new_v4();
        let message = SummaryMessage::new(id, "Short summary");
        let json = serde_json::to_string(&message).unwrap();

        assert!(json.contains("\"documentId\""));
        let parsed: SummaryMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.document_uuid().unwrap(), id);
        assert_eq!(parsed.summary, "Short summary");
    }

    #[test]
    fn test_summary_message_invalid_id() {
        let message = SummaryMessage {
            document_id: "not-a-uuid".to_string(),
            summary: "x".to_string(),
        };
        assert!(message.document_uuid().is_err());
    }
}
