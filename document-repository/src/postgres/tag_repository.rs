//! PostgreSQL implementation of the tag repository.

use async_trait::async_trait;
use document_shared::Tag;
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::interfaces::TagRepository;
use crate::postgres::is_unique_violation;
use crate::postgres::rows::TagRow;

/// PostgreSQL-backed tag repository.
///
/// Name uniqueness is enforced by the unique index on `lower(name)`, so two
/// concurrent creations of `Urgent` and `urgent` cannot both succeed.
#[derive(Clone)]
pub struct PostgresTagRepository {
    pool: sqlx::PgPool,
}

impl PostgresTagRepository {
    /// Creates a new PostgreSQL tag repository.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PostgresTagRepository {
    async fn save(&self, tag: &Tag) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO tags (id, name, color) VALUES ($1, $2, $3)")
            .bind(tag.id)
            .bind(&tag.name)
            .bind(&tag.color)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::duplicate(format!("tag '{}'", tag.name))
                } else {
                    RepositoryError::from(e)
                }
            })?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tag>, RepositoryError> {
        let row = sqlx::query_as::<_, TagRow>("SELECT id, name, color FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Tag::from))
    }

    async fn find_all(&self) -> Result<Vec<Tag>, RepositoryError> {
        let rows = sqlx::query_as::<_, TagRow>("SELECT id, name, color FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }

    async fn find_by_name_ignore_case(&self, name: &str) -> Result<Option<Tag>, RepositoryError> {
        let row = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, color FROM tags WHERE lower(name) = lower($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Tag::from))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_document(&self, document_id: Uuid) -> Result<Vec<Tag>, RepositoryError> {
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
}
