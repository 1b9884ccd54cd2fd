//! PostgreSQL implementation of the document repository.

use std::collections::HashMap;

use async_trait::async_trait;
use document_shared::{Document, Tag};
use tracing::debug;
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::interfaces::DocumentRepository;
use crate::postgres::rows::{DocumentRow, DocumentTagRow, TagRow, DOCUMENT_COLUMNS};
use crate::postgres::{is_foreign_key_violation, is_unique_violation};

/// PostgreSQL-backed document repository.
///
/// Holds a `sqlx::PgPool`; cloning the repository shares the pool.
#[derive(Clone)]
pub struct PostgresDocumentRepository {
    pool: sqlx::PgPool,
}

impl PostgresDocumentRepository {
    /// Creates a new PostgreSQL document repository.
    ///
    /// # Arguments
    ///
    /// * `pool` - Connection pool for a database with the schema from `migrations/`
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn tags_for(&self, document_id: Uuid) -> Result<Vec<Tag>, RepositoryError> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT t.id, t.name, t.color FROM tags t \
             JOIN document_tags dt ON dt.tag_id = t.id \
             WHERE dt.document_id = $1 ORDER BY t.name",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }

    async fn tags_for_many(
        &self,
        document_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, RepositoryError> {
        let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        if document_ids.is_empty() {
            return Ok(tags);
        }

        let rows = sqlx::query_as::<_, DocumentTagRow>(
            "SELECT dt.document_id, t.id, t.name, t.color FROM document_tags dt \
             JOIN tags t ON t.id = dt.tag_id \
             WHERE dt.document_id = ANY($1) ORDER BY t.name",
        )
        .bind(document_ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            tags.entry(row.document_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
                color: row.color,
            });
        }

        Ok(tags)
    }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    async fn insert(&self, document: &Document) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO documents \
             (id, filename, content_type, size, uploaded_at, uploaded_by, storage_key, summary, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(document.id)
        .bind(&document.filename)
        .bind(&document.content_type)
        .bind(document.size)
        .bind(document.uploaded_at)
        .bind(&document.uploaded_by)
        .bind(&document.storage_key)
        .bind(&document.summary)
        .bind(document.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::duplicate(format!("document {}", document.id))
            } else {
                RepositoryError::from(e)
            }
        })?;

        debug!(document_id = %document.id, "Inserted document");
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let tags = self.tags_for(id).await?;
                Ok(Some(row.into_document(tags)))
            }
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> Result<Vec<Document>, RepositoryError> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents ORDER BY uploaded_at DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut tags = self.tags_for_many(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let document_tags = tags.remove(&row.id).unwrap_or_default();
                row.into_document(document_tags)
            })
            .collect())
    }

    async fn update(
        &self,
        document: &Document,
        expected_version: i64,
    ) -> Result<Document, RepositoryError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE documents SET filename = $2, content_type = $3, size = $4, \
             storage_key = $5, summary = $6, version = version + 1 \
             WHERE id = $1 AND version = $7 RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(document.id)
        .bind(&document.filename)
        .bind(&document.content_type)
        .bind(document.size)
        .bind(&document.storage_key)
        .bind(&document.summary)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let tags = self.tags_for(document.id).await?;
                debug!(
                    document_id = %document.id,
                    version = row.version,
                    "Updated document"
                );
                Ok(row.into_document(tags))
            }
            None => {
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM documents WHERE id = $1")
                        .bind(document.id)
                        .fetch_optional(&self.pool)
                        .await?;

                match actual {
                    Some(actual) => Err(RepositoryError::VersionConflict {
                        id: document.id,
                        expected: expected_version,
                        actual,
                    }),
                    None => Err(RepositoryError::not_found(format!(
                        "document {}",
                        document.id
                    ))),
                }
            }
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_summary(&self, id: Uuid, summary: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE documents SET summary = $2 WHERE id = $1")
            .bind(id)
            .bind(summary)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_tag(&self, document_id: Uuid, tag_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO document_tags (document_id, tag_id) VALUES ($1, $2) \
             ON CONFLICT (document_id, tag_id) DO NOTHING",
        )
        .bind(document_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                RepositoryError::not_found(format!("document {} or tag {}", document_id, tag_id))
            } else {
                RepositoryError::from(e)
            }
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_tag(&self, document_id: Uuid, tag_id: Uuid) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM document_tags WHERE document_id = $1 AND tag_id = $2")
                .bind(document_id)
                .bind(tag_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
