use thiserror::Error;
use uuid::Uuid;

/// Represents errors that can occur within the document and tag repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The stored version differs from the one the caller read.
    #[error("Version conflict for document {id}: expected {expected}, found {actual}")]
    VersionConflict { id: Uuid, expected: i64, actual: i64 },

    /// A uniqueness constraint was violated.
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a duplicate error.
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }
}

impl From<sqlx::migrate::MigrateError> for RepositoryError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::MigrationError(err.to_string())
    }
}
