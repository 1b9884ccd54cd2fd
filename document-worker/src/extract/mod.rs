//! Text extraction and summarization of stored documents.

mod summarizer;

pub use summarizer::{ExtractiveSummarizer, Summarizer, DEFAULT_SUMMARY_CHARS, FALLBACK_SUMMARY};

use bytes::Bytes;
use tracing::debug;

use crate::errors::ExtractionError;

/// Content types decoded as UTF-8 besides `text/*`.
const TEXTUAL_APPLICATION_TYPES: &[&str] = &["application/json", "application/xml"];

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Media type without parameters, lower-cased (`Text/Plain; charset=utf-8` -> `text/plain`).
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Turns stored content into plain text according to its content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the text of a document.
    ///
    /// Unsupported content types yield an empty string.
    ///
    /// # Errors
    ///
    /// * `ExtractionError::Corrupt` - The content does not parse as its declared type
    pub async fn extract(&self, content_type: &str, content: Bytes) -> Result<String, ExtractionError> {
        let media_type = media_type(content_type);

        if media_type.starts_with("text/") || TEXTUAL_APPLICATION_TYPES.contains(&media_type.as_str())
        {
            return Ok(String::from_utf8_lossy(&content).into_owned());
        }

        if media_type == PDF_CONTENT_TYPE {
            // PDF parsing is CPU bound
            let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&content))
                .await
                .map_err(|e| ExtractionError::Task(e.to_string()))?
                .map_err(|e| ExtractionError::corrupt(e.to_string()))?;
            return Ok(text.trim().to_string());
        }

        debug!(content_type = %content_type, "No text extractor for content type");
        Ok(String::new())
    }
}
