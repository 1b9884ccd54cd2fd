//! Storage key derivation.
//!
//! The original filename of an upload is untrusted display data. Before it is
//! used as part of an object name it is reduced to `[A-Za-z0-9_-]` plus an
//! optional alphanumeric extension, and prefixed with the document identifier
//! so that two uploads of `report.pdf` never collide.

use uuid::Uuid;

/// Name used when nothing usable is left of the original filename.
pub const FALLBACK_FILE_NAME: &str = "unnamed";

/// Maximum number of characters kept from the filename base.
pub const MAX_BASE_NAME_CHARS: usize = 200;

/// Maximum length of a preserved extension.
pub const MAX_EXTENSION_CHARS: usize = 16;

/// Prefix under which extracted document text is stored.
pub const OCR_TEXT_PREFIX: &str = "ocr";

/// Reduce an arbitrary filename to a storage-safe component.
///
/// The extension (the part after the last `.`) is preserved in lower case when
/// it is non-empty, short and purely alphanumeric. Every character of the base
/// outside `[A-Za-z0-9_-]` is removed, so path separators, `..`, whitespace and
/// control characters can never reach the object store.
///
/// # Example
///
/// ```
/// use document_shared::sanitize_filename;
///
/// assert_eq!(sanitize_filename("report 1.pdf"), "report1.pdf");
/// assert_eq!(sanitize_filename(""), "unnamed");
/// ```
pub fn sanitize_filename(original: &str) -> String {
    let name = original.trim();

    let (base, extension) = match name.rsplit_once('.') {
        Some((base, ext))
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_CHARS
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (base, Some(ext.to_ascii_lowercase()))
        }
        _ => (name, None),
    };

    let mut sanitized: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_BASE_NAME_CHARS)
        .collect();

    if sanitized.is_empty() {
        sanitized.push_str(FALLBACK_FILE_NAME);
    }

    match extension {
        Some(ext) => format!("{}.{}", sanitized, ext),
        None => sanitized,
    }
}

/// Build the storage key for a fresh upload: `<id>-<sanitized filename>`.
pub fn storage_key(id: Uuid, filename: &str) -> String {
    format!("{}-{}", id, sanitize_filename(filename))
}

/// Build the storage key for one replacement attempt:
/// `<id>-r<attempt>-<sanitized filename>`.
///
/// Every attempt owns its key, so the object an attempt writes (and deletes
/// again when it loses the version check) is never the one another writer's
/// row points at.
pub fn replacement_storage_key(id: Uuid, attempt: Uuid, filename: &str) -> String {
    format!("{}-r{}-{}", id, attempt.simple(), sanitize_filename(filename))
}

/// Key under which the extracted text of a document is kept.
pub fn ocr_text_key(id: Uuid) -> String {
    format!("{}/{}.txt", OCR_TEXT_PREFIX, id)
}
