//! Request types accepted by the services, with their validation rules.

use bytes::Bytes;

use crate::errors::ServiceError;

/// Maximum tag name length in characters.
pub const MAX_TAG_NAME_CHARS: usize = 100;

/// Maximum tag color length in characters.
pub const MAX_TAG_COLOR_CHARS: usize = 20;

fn require_non_blank(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{} must not be blank", field)));
    }
    Ok(())
}

fn validate_content(bytes: &Bytes, size: i64, max_size: i64) -> Result<(), ServiceError> {
    if size <= 0 {
        return Err(ServiceError::validation("size must be positive"));
    }
    if size > max_size {
        return Err(ServiceError::validation(format!(
            "size must not exceed {} bytes",
            max_size
        )));
    }
    if bytes.len() as u64 != size as u64 {
        return Err(ServiceError::validation(format!(
            "size {} does not match content length {}",
            size,
            bytes.len()
        )));
    }
    Ok(())
}

/// A new document to store.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    /// Opaque uploader identity; `anonymous` when absent.
    pub uploaded_by: Option<String>,
}

impl UploadRequest {
    /// Build a request whose declared size is the content length.
    pub fn new(
        bytes: impl Into<Bytes>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            size: bytes.len() as i64,
            bytes,
            filename: filename.into(),
            content_type: content_type.into(),
            uploaded_by: None,
        }
    }

    pub fn uploaded_by(mut self, uploader: impl Into<String>) -> Self {
        self.uploaded_by = Some(uploader.into());
        self
    }

    pub(crate) fn validate(&self, max_size: i64) -> Result<(), ServiceError> {
        require_non_blank("filename", &self.filename)?;
        require_non_blank("contentType", &self.content_type)?;
        validate_content(&self.bytes, self.size, max_size)
    }
}

/// New content for an existing document.
#[derive(Debug, Clone)]
pub struct ReplaceRequest {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

impl ReplaceRequest {
    pub fn new(
        bytes: impl Into<Bytes>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            size: bytes.len() as i64,
            bytes,
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }

    pub(crate) fn validate(&self, max_size: i64) -> Result<(), ServiceError> {
        require_non_blank("filename", &self.filename)?;
        require_non_blank("contentType", &self.content_type)?;
        validate_content(&self.bytes, self.size, max_size)
    }
}

/// Metadata changes that leave the stored content untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMetadataRequest {
    pub filename: String,
    pub content_type: String,
}

impl UpdateMetadataRequest {
    pub(crate) fn validate(&self) -> Result<(), ServiceError> {
        require_non_blank("filename", &self.filename)?;
        require_non_blank("contentType", &self.content_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRequest {
    pub name: String,
    pub color: Option<String>,
}

impl TagRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Validate and return the trimmed name and the color (blank colors become `None`).
    pub(crate) fn normalized(&self) -> Result<(String, Option<String>), ServiceError> {
        let name = self.name.trim();
        require_non_blank("name", name)?;
        if name.chars().count() > MAX_TAG_NAME_CHARS {
            return Err(ServiceError::validation(format!(
                "name must be at most {} characters",
                MAX_TAG_NAME_CHARS
            )));
        }

        let color = self
            .color
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if let Some(color) = color {
            if color.chars().count() > MAX_TAG_COLOR_CHARS {
                return Err(ServiceError::validation(format!(
                    "color must be at most {} characters",
                    MAX_TAG_COLOR_CHARS
                )));
            }
        }

        Ok((name.to_string(), color.map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: i64 = 1024;

    #[test]
    fn test_upload_request_sizes_from_content() {
        let request = UploadRequest::new("hello", "a.txt", "text/plain");
        assert_eq!(request.size, 5);
        assert!(request.validate(MAX).is_ok());
    }

    #[test]
    fn test_upload_request_rejects_blank_fields() {
        let request = UploadRequest::new("hello", "  ", "text/plain");
        assert!(matches!(
            request.validate(MAX),
            Err(ServiceError::ValidationFailed(msg)) if msg.contains("filename")
        ));

        let request = UploadRequest::new("hello", "a.txt", "");
        assert!(matches!(
            request.validate(MAX),
            Err(ServiceError::ValidationFailed(msg)) if msg.contains("contentType")
        ));
    }

    #[test]
    fn test_upload_request_rejects_bad_sizes() {
        let empty = UploadRequest::new("", "a.txt", "text/plain");
        assert!(empty.validate(MAX).is_err());

        let mut mismatch = UploadRequest::new("hello", "a.txt", "text/plain");
        mismatch.size = 4;
        assert!(mismatch.validate(MAX).is_err());

        let too_big = UploadRequest::new(vec![0u8; 2048], "a.bin", "application/octet-stream");
        assert!(too_big.validate(MAX).is_err());
    }

    #[test]
    fn test_tag_request_trims_and_limits() {
        let (name, color) = TagRequest::new("  Urgent ")
            .with_color("#ff0000")
            .normalized()
            .unwrap();
        assert_eq!(name, "Urgent");
        assert_eq!(color.as_deref(), Some("#ff0000"));

        assert!(TagRequest::new("   ").normalized().is_err());
        assert!(TagRequest::new("x".repeat(101)).normalized().is_err());
        assert!(TagRequest::new("x".repeat(100)).normalized().is_ok());
        assert!(TagRequest::new("ok")
            .with_color("c".repeat(21))
            .normalized()
            .is_err());
    }

    #[test]
    fn test_blank_color_is_dropped() {
        let (_, color) = TagRequest::new("ok").with_color("  ").normalized().unwrap();
        assert_eq!(color, None);
    }
}
