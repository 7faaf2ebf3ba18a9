use arca_core::models::{Download, DownloadStatus};
use arca_core::AppError;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Channel name for PostgreSQL LISTEN/NOTIFY when a download becomes
/// runnable.
pub const DOWNLOAD_NOTIFY_CHANNEL: &str = "arca_new_download";

const ALL_COLUMNS: &str = r#"
    id, url, domain, downloader, sub_downloader, destination, frequency_seconds,
    status, location, error, attempts, last_successful_download, next_download,
    settings, tag_names, collection_id, created_at, updated_at
"#;

#[derive(Clone)]
pub struct DownloadRepository {
    pool: PgPool,
}

impl DownloadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Download>, AppError> {
        let download = sqlx::query_as::<Postgres, Download>(&format!(
            "SELECT {ALL_COLUMNS} FROM downloads WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(download)
    }

    pub async fn find(&self, id: Uuid) -> Result<Download, AppError> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cannot find download with id {}", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "select"))]
    pub async fn get_active_by_url(&self, url: &str) -> Result<Option<Download>, AppError> {
        let download = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM downloads
            WHERE url = $1 AND status IN ('new', 'pending', 'deferred')
            "#
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(download)
    }

    /// Create a download. Idempotent per URL: when a non-terminal row already
    /// exists for `url` it is returned unchanged. Notifies workers on insert.
    #[tracing::instrument(skip(self, settings, tag_names), fields(db.table = "downloads", db.operation = "insert"))]
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        url: &str,
        downloader: &str,
        sub_downloader: Option<&str>,
        destination: Option<&str>,
        frequency_seconds: Option<i64>,
        settings: Value,
        tag_names: &[String],
        collection_id: Option<Uuid>,
    ) -> Result<Download, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serialized idempotency check; the partial unique index backstops
        // races between concurrent creates.
        let existing = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM downloads
            WHERE url = $1 AND status IN ('new', 'pending', 'deferred')
            FOR UPDATE
            "#
        ))
        .bind(url)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            tx.commit().await?;
            return Ok(existing);
        }

        let domain = Download::domain_of(url);
        let download = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            INSERT INTO downloads (
                url, domain, downloader, sub_downloader, destination,
                frequency_seconds, status, settings, tag_names, collection_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'new', $7, $8, $9)
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(url)
        .bind(domain)
        .bind(downloader)
        .bind(sub_downloader)
        .bind(destination)
        .bind(frequency_seconds)
        .bind(settings)
        .bind(Json(tag_names))
        .bind(collection_id)
        .fetch_one(&mut *tx)
        .await?;

        // Wake workers immediately; polling is the fallback when NOTIFY fails.
        if let Err(e) = sqlx::query(&format!("SELECT pg_notify('{DOWNLOAD_NOTIFY_CHANNEL}', '')"))
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(error = %e, "pg_notify failed, workers will poll");
        }

        tx.commit().await?;
        Ok(download)
    }

    /// Claim the next eligible download, transitioning it `-> pending` inside
    /// a transaction so the per-URL single-flight holds across workers.
    ///
    /// Eligibility: `new` rows first, then `deferred` rows whose
    /// `next_download` elapsed (recurring rows re-enter as deferred clones).
    /// Oldest first within each class. Rows whose domain is in
    /// `excluded_domains` are skipped by the per-domain throttle.
    #[tracing::instrument(skip(self, excluded_domains), fields(db.table = "downloads", db.operation = "update"))]
    pub async fn claim_next(
        &self,
        excluded_domains: &[String],
    ) -> Result<Option<Download>, AppError> {
        let mut tx = self.pool.begin().await?;

        let download = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM downloads
            WHERE (
                    status = 'new'
                    OR (status = 'deferred' AND next_download IS NOT NULL AND next_download <= NOW())
                  )
              AND (domain IS NULL OR NOT (domain = ANY($1)))
            ORDER BY CASE status WHEN 'new' THEN 0 ELSE 1 END, created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#
        ))
        .bind(excluded_domains)
        .fetch_optional(&mut *tx)
        .await?;

        let claimed = match download {
            Some(download) => {
                let claimed = sqlx::query_as::<Postgres, Download>(&format!(
                    r#"
                    UPDATE downloads
                    SET status = 'pending', updated_at = NOW()
                    WHERE id = $1
                    RETURNING {ALL_COLUMNS}
                    "#
                ))
                .bind(download.id)
                .fetch_one(&mut *tx)
                .await?;
                Some(claimed)
            }
            None => None,
        };

        tx.commit().await?;
        Ok(claimed)
    }

    /// Mark a download complete. For recurring downloads the completed row is
    /// terminal history; a fresh deferred row is inserted with
    /// `next_download = now + frequency`.
    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "update", db.record_id = %id))]
    pub async fn mark_complete(&self, id: Uuid, location: Option<&str>) -> Result<Download, AppError> {
        let mut tx = self.pool.begin().await?;

        let download = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            UPDATE downloads
            SET status = 'complete',
                location = $2,
                error = NULL,
                last_successful_download = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(location)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(frequency) = download.frequency_seconds {
            let next_download = Utc::now() + Duration::seconds(frequency);
            sqlx::query(
                r#"
                INSERT INTO downloads (
                    url, domain, downloader, sub_downloader, destination,
                    frequency_seconds, status, attempts, next_download,
                    last_successful_download, settings, tag_names, collection_id
                )
                SELECT url, domain, downloader, sub_downloader, destination,
                       frequency_seconds, 'deferred', 0, $2,
                       last_successful_download, settings, tag_names, collection_id
                FROM downloads WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(next_download)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(download)
    }

    /// Defer a download for retry after a transient failure.
    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "update", db.record_id = %id))]
    pub async fn defer(
        &self,
        id: Uuid,
        next_download: DateTime<Utc>,
        error: &str,
    ) -> Result<Download, AppError> {
        let download = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            UPDATE downloads
            SET status = 'deferred',
                attempts = attempts + 1,
                next_download = $2,
                error = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(next_download)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;
        Ok(download)
    }

    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "update", db.record_id = %id))]
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<Download, AppError> {
        let download = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            UPDATE downloads
            SET status = 'failed',
                attempts = attempts + 1,
                error = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;
        Ok(download)
    }

    /// Put a download back at the front of the queue with a clean slate.
    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "update", db.record_id = %id))]
    pub async fn restart(&self, id: Uuid) -> Result<Download, AppError> {
        let download = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            UPDATE downloads
            SET status = 'new', attempts = 0, error = NULL, next_download = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let _ = sqlx::query(&format!("SELECT pg_notify('{DOWNLOAD_NOTIFY_CHANNEL}', '')"))
            .execute(&self.pool)
            .await;
        Ok(download)
    }

    /// Requeue every failed download.
    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "update"))]
    pub async fn retry_failed(&self) -> Result<u64, AppError> {
        let rows = sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'new', attempts = 0, error = NULL, next_download = NULL, updated_at = NOW()
            WHERE status = 'failed'
              AND url NOT IN (
                SELECT url FROM downloads WHERE status IN ('new', 'pending', 'deferred')
              )
            "#,
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        let _ = sqlx::query(&format!("SELECT pg_notify('{DOWNLOAD_NOTIFY_CHANNEL}', '')"))
            .execute(&self.pool)
            .await;
        Ok(rows)
    }

    /// Complete failed or deferred downloads of `url` out of band, e.g. when
    /// the content arrived by upload instead.
    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "update"))]
    pub async fn complete_for_url(&self, url: &str, location: &str) -> Result<u64, AppError> {
        let rows = sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'complete',
                location = $2,
                error = NULL,
                last_successful_download = NOW(),
                updated_at = NOW()
            WHERE url = $1 AND status IN ('failed', 'deferred')
            "#,
        )
        .bind(url)
        .bind(location)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "downloads", db.operation = "delete"))]
    pub async fn delete_ids(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let rows = sqlx::query("DELETE FROM downloads WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "select"))]
    pub async fn list(&self, status: Option<DownloadStatus>) -> Result<Vec<Download>, AppError> {
        let downloads = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM downloads
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;
        Ok(downloads)
    }

    /// Downloads worth mirroring to the config file: everything recurring
    /// plus outstanding one-shots.
    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "select"))]
    pub async fn list_for_config(&self) -> Result<Vec<Download>, AppError> {
        let downloads = sqlx::query_as::<Postgres, Download>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM downloads
            WHERE frequency_seconds IS NOT NULL OR status IN ('new', 'pending', 'deferred')
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(downloads)
    }

    /// Rewrite destinations under `old` to the corresponding path under
    /// `new` after a collection move.
    #[tracing::instrument(skip(self), fields(db.table = "downloads", db.operation = "update"))]
    pub async fn move_destination(&self, old: &str, new: &str) -> Result<u64, AppError> {
        let old = old.trim_end_matches('/');
        let new = new.trim_end_matches('/');
        let rows = sqlx::query(
            r#"
            UPDATE downloads
            SET destination = $2 || substr(destination, length($1) + 1),
                updated_at = NOW()
            WHERE destination = $1 OR destination LIKE $1 || '/%'
            "#,
        )
        .bind(old)
        .bind(new)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows)
    }
}
