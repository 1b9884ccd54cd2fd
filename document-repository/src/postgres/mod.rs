//! PostgreSQL implementation of the document and tag repositories.
//!
//! ## Database Tables
//!
//! - `documents`: One row per document, carrying the optimistic `version` counter
//! - `tags`: Tags with a unique index on `lower(name)`
//! - `document_tags`: Many-to-many association, cascading on either side

mod document_repository;
mod rows;
mod tag_repository;

pub use document_repository::PostgresDocumentRepository;
pub use tag_repository::PostgresTagRepository;

use sqlx::PgPool;
use tracing::info;

use crate::errors::RepositoryError;

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// Returns true if the error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Returns true if the error is a foreign key violation.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
