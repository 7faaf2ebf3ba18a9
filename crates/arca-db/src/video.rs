use arca_core::models::Video;
use arca_core::AppError;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const ALL_COLUMNS: &str = r#"
    id, file_group_id, channel_id, source_id, upload_date, duration_seconds,
    view_count, url, created_at
"#;

#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            "SELECT {ALL_COLUMNS} FROM videos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select"))]
    pub async fn get_by_file_group(&self, file_group_id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            "SELECT {ALL_COLUMNS} FROM videos WHERE file_group_id = $1"
        ))
        .bind(file_group_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    /// Videos matching any of the URLs; used for dedupe checks.
    #[tracing::instrument(skip(self, urls), fields(db.table = "videos", db.operation = "select"))]
    pub async fn list_by_urls(&self, urls: &[String]) -> Result<Vec<Video>, AppError> {
        let videos = sqlx::query_as::<Postgres, Video>(&format!(
            "SELECT {ALL_COLUMNS} FROM videos WHERE url = ANY($1)"
        ))
        .bind(urls)
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "upsert"))]
    pub async fn find_or_create(&self, file_group_id: Uuid) -> Result<Video, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            r#"
            INSERT INTO videos (file_group_id)
            VALUES ($1)
            ON CONFLICT (file_group_id) DO UPDATE SET file_group_id = EXCLUDED.file_group_id
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(file_group_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(video)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "update", db.record_id = %id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        id: Uuid,
        channel_id: Option<Uuid>,
        source_id: Option<&str>,
        upload_date: Option<DateTime<Utc>>,
        duration_seconds: Option<i32>,
        view_count: Option<i64>,
        url: Option<&str>,
    ) -> Result<Video, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            r#"
            UPDATE videos
            SET channel_id = $2, source_id = $3, upload_date = $4,
                duration_seconds = $5, view_count = $6, url = $7
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(channel_id)
        .bind(source_id)
        .bind(upload_date)
        .bind(duration_seconds)
        .bind(view_count)
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        Ok(video)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select"))]
    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
