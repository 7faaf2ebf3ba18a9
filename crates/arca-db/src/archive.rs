use arca_core::models::Archive;
use arca_core::AppError;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const ALL_COLUMNS: &str = r#"
    id, file_group_id, collection_id, url, archive_datetime, created_at
"#;

#[derive(Clone)]
pub struct ArchiveRepository {
    pool: PgPool,
}

impl ArchiveRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Archive>, AppError> {
        let archive = sqlx::query_as::<Postgres, Archive>(&format!(
            "SELECT {ALL_COLUMNS} FROM archives WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(archive)
    }

    pub async fn find(&self, id: Uuid) -> Result<Archive, AppError> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cannot find archive with id {}", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "select"))]
    pub async fn get_by_file_group(&self, file_group_id: Uuid) -> Result<Option<Archive>, AppError> {
        let archive = sqlx::query_as::<Postgres, Archive>(&format!(
            "SELECT {ALL_COLUMNS} FROM archives WHERE file_group_id = $1"
        ))
        .bind(file_group_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(archive)
    }

    /// The most recent archive of a URL, if any.
    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "select"))]
    pub async fn latest_by_url(&self, url: &str) -> Result<Option<Archive>, AppError> {
        let archive = sqlx::query_as::<Postgres, Archive>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM archives
            WHERE url = $1
            ORDER BY archive_datetime DESC NULLS LAST
            LIMIT 1
            "#
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(archive)
    }

    /// Archives matching any of the URLs; used for dedupe checks.
    #[tracing::instrument(skip(self, urls), fields(db.table = "archives", db.operation = "select"))]
    pub async fn list_by_urls(&self, urls: &[String]) -> Result<Vec<Archive>, AppError> {
        let archives = sqlx::query_as::<Postgres, Archive>(&format!(
            "SELECT {ALL_COLUMNS} FROM archives WHERE url = ANY($1)"
        ))
        .bind(urls)
        .fetch_all(&self.pool)
        .await?;
        Ok(archives)
    }

    /// Other archives of the same URL, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "select", db.record_id = %id))]
    pub async fn history(&self, id: Uuid, url: &str) -> Result<Vec<Archive>, AppError> {
        let archives = sqlx::query_as::<Postgres, Archive>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM archives
            WHERE id != $1 AND url = $2
            ORDER BY archive_datetime ASC NULLS LAST
            "#
        ))
        .bind(id)
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        Ok(archives)
    }

    /// Get the archive of a file group, creating it when missing.
    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "upsert"))]
    pub async fn find_or_create(&self, file_group_id: Uuid) -> Result<Archive, AppError> {
        let archive = sqlx::query_as::<Postgres, Archive>(&format!(
            r#"
            INSERT INTO archives (file_group_id)
            VALUES ($1)
            ON CONFLICT (file_group_id) DO UPDATE SET file_group_id = EXCLUDED.file_group_id
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(file_group_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(archive)
    }

    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        url: Option<&str>,
        archive_datetime: Option<DateTime<Utc>>,
        collection_id: Option<Uuid>,
    ) -> Result<Archive, AppError> {
        let archive = sqlx::query_as::<Postgres, Archive>(&format!(
            r#"
            UPDATE archives
            SET url = $2, archive_datetime = $3, collection_id = $4
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(url)
        .bind(archive_datetime)
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(archive)
    }

    /// A page of archives, oldest first. Used by the cleanup hook to sweep
    /// the whole table in bounded batches.
    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "select"))]
    pub async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Archive>, AppError> {
        let archives = sqlx::query_as::<Postgres, Archive>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM archives
            ORDER BY created_at ASC, id ASC
            OFFSET $1 LIMIT $2
            "#
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(archives)
    }

    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows = sqlx::query("DELETE FROM archives WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    /// Detach every archive of a collection. Used when the collection is
    /// deleted; the archives survive as orphans.
    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "update"))]
    pub async fn orphan_collection(&self, collection_id: Uuid) -> Result<u64, AppError> {
        let rows = sqlx::query("UPDATE archives SET collection_id = NULL WHERE collection_id = $1")
            .bind(collection_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "archives", db.operation = "select"))]
    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM archives")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
