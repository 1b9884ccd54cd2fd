//! Service-level error taxonomy.

use document_broker::PublishError;
use document_repository::RepositoryError;
use document_search::SearchError;
use thiserror::Error;

/// Whether an error was caused by the caller or by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientError,
    ServerError,
}

/// Errors returned by `DocumentService` and `TagService`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The requested document or tag does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A request field is invalid; carries the first violation.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A tag with the same name (ignoring case) already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Storage delete failed: {0}")]
    StorageDeleteFailed(String),

    #[error("Storage read failed: {0}")]
    StorageReadFailed(String),

    /// The broker did not accept a message.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// The document changed since it was read.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl ServiceError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Create an already exists error.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_)
            | Self::ValidationFailed(_)
            | Self::AlreadyExists(_)
            | Self::Conflict(_) => ErrorKind::ClientError,
            _ => ErrorKind::ServerError,
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => Self::NotFound(msg),
            RepositoryError::Duplicate(msg) => Self::AlreadyExists(msg),
            conflict @ RepositoryError::VersionConflict { .. } => {
                Self::Conflict(conflict.to_string())
            }
            other => Self::Repository(other.to_string()),
        }
    }
}

impl From<PublishError> for ServiceError {
    fn from(err: PublishError) -> Self {
        Self::PublishFailed(err.to_string())
    }
}

impl From<SearchError> for ServiceError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::SearchUnavailable(msg) => Self::SearchUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_kind() {
        assert_eq!(ServiceError::not_found("x").kind(), ErrorKind::ClientError);
        assert_eq!(ServiceError::validation("x").kind(), ErrorKind::ClientError);
        assert_eq!(
            ServiceError::already_exists("x").kind(),
            ErrorKind::ClientError
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).kind(),
            ErrorKind::ClientError
        );
        assert_eq!(
            ServiceError::StorageWriteFailed("x".into()).kind(),
            ErrorKind::ServerError
        );
        assert_eq!(
            ServiceError::PublishFailed("x".into()).kind(),
            ErrorKind::ServerError
        );
    }

    #[test]
    fn test_from_repository_error() {
        assert!(matches!(
            ServiceError::from(RepositoryError::not_found("doc")),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::duplicate("tag")),
            ServiceError::AlreadyExists(_)
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::VersionConflict {
                id: Uuid::new_v4(),
                expected: 1,
                actual: 2
            }),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(RepositoryError::MigrationError("boom".into())),
            ServiceError::Repository(_)
        ));
    }
}
