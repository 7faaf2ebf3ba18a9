use arca_core::models::Tag;
use arca_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[derive(Clone)]
pub struct TagRepository {
    pool: PgPool,
}

impl TagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "select"))]
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Tag>, AppError> {
        let tag = sqlx::query_as::<Postgres, Tag>(
            "SELECT id, name, color, created_at FROM tags WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tag)
    }

    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "select"))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Tag>, AppError> {
        let tag = sqlx::query_as::<Postgres, Tag>(
            "SELECT id, name, color, created_at FROM tags WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tag)
    }

    /// Get a tag by name, creating it when missing. Color is only applied on
    /// creation; an existing tag keeps its color.
    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "upsert"))]
    pub async fn find_or_create(&self, name: &str, color: Option<&str>) -> Result<Tag, AppError> {
        let tag = sqlx::query_as::<Postgres, Tag>(
            r#"
            INSERT INTO tags (name, color)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, color, created_at
            "#,
        )
        .bind(name)
        .bind(color)
        .fetch_one(&self.pool)
        .await?;
        Ok(tag)
    }

    /// Create or update a tag from config; config values win.
    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "upsert"))]
    pub async fn upsert(&self, name: &str, color: Option<&str>) -> Result<Tag, AppError> {
        let tag = sqlx::query_as::<Postgres, Tag>(
            r#"
            INSERT INTO tags (name, color)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET color = EXCLUDED.color
            RETURNING id, name, color, created_at
            "#,
        )
        .bind(name)
        .bind(color)
        .fetch_one(&self.pool)
        .await?;
        Ok(tag)
    }

    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Tag>, AppError> {
        let tags = sqlx::query_as::<Postgres, Tag>(
            "SELECT id, name, color, created_at FROM tags ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Delete a tag by name. Refused while the tag is referenced by a
    /// collection so tagged directories never lose their tag silently.
    #[tracing::instrument(skip(self), fields(db.table = "tags", db.operation = "delete"))]
    pub async fn delete_by_name(&self, name: &str) -> Result<bool, AppError> {
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM collections c JOIN tags t ON c.tag_id = t.id WHERE t.name = $1
            )
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        if referenced {
            return Err(AppError::Conflict(format!(
                "Tag {} is used by a collection",
                name
            )));
        }

        let rows = sqlx::query("DELETE FROM tags WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    /// Attach a tag to a file group. Idempotent.
    #[tracing::instrument(skip(self), fields(db.table = "tag_files", db.operation = "insert"))]
    pub async fn tag_file_group(&self, tag_id: Uuid, file_group_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tag_files (tag_id, file_group_id)
            VALUES ($1, $2)
            ON CONFLICT (tag_id, file_group_id) DO NOTHING
            "#,
        )
        .bind(tag_id)
        .bind(file_group_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "tag_files", db.operation = "delete"))]
    pub async fn untag_file_group(
        &self,
        tag_id: Uuid,
        file_group_id: Uuid,
    ) -> Result<bool, AppError> {
        let rows = sqlx::query("DELETE FROM tag_files WHERE tag_id = $1 AND file_group_id = $2")
            .bind(tag_id)
            .bind(file_group_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    /// Tags attached to a file group, by name.
    #[tracing::instrument(skip(self), fields(db.table = "tag_files", db.operation = "select"))]
    pub async fn list_for_file_group(&self, file_group_id: Uuid) -> Result<Vec<Tag>, AppError> {
        let tags = sqlx::query_as::<Postgres, Tag>(
            r#"
            SELECT t.id, t.name, t.color, t.created_at
            FROM tags t
            JOIN tag_files tf ON tf.tag_id = t.id
            WHERE tf.file_group_id = $1
            ORDER BY t.name ASC
            "#,
        )
        .bind(file_group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Delete tags whose names are not in `keep`. Used by config import
    /// delete-on-removal; tags referenced by collections are skipped.
    #[tracing::instrument(skip(self, keep), fields(db.table = "tags", db.operation = "delete"))]
    pub async fn delete_missing(&self, keep: &[String]) -> Result<u64, AppError> {
        let rows = sqlx::query(
            r#"
            DELETE FROM tags
            WHERE NOT (name = ANY($1))
              AND id NOT IN (SELECT tag_id FROM collections WHERE tag_id IS NOT NULL)
            "#,
        )
        .bind(keep)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows)
    }
}
