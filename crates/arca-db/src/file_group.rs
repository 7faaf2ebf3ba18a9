use std::collections::HashMap;

use arca_core::models::FileGroup;
use arca_core::AppError;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const ALL_COLUMNS: &str = r#"
    id, directory, stem, primary_path, mimetype, size, indexed, deep_indexed,
    title, author, url, published_datetime, modified_datetime,
    a_text, b_text, c_text, d_text, data, files, model, failure,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct FileGroupRepository {
    pool: PgPool,
}

impl FileGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_groups", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<FileGroup>, AppError> {
        let fg = sqlx::query_as::<Postgres, FileGroup>(&format!(
            "SELECT {ALL_COLUMNS} FROM file_groups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(fg)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_groups", db.operation = "select"))]
    pub async fn get_by_stem(
        &self,
        directory: &str,
        stem: &str,
    ) -> Result<Option<FileGroup>, AppError> {
        let fg = sqlx::query_as::<Postgres, FileGroup>(&format!(
            "SELECT {ALL_COLUMNS} FROM file_groups WHERE directory = $1 AND stem = $2"
        ))
        .bind(directory)
        .bind(stem)
        .fetch_optional(&self.pool)
        .await?;
        Ok(fg)
    }

    /// Surface-index upsert keyed by `(directory, stem)`.
    ///
    /// Sets `indexed = true` and clears `deep_indexed` so the next deep pass
    /// re-models the group; the data bag and extracted text survive so a
    /// re-scan never loses modeler output.
    #[tracing::instrument(skip(self, files), fields(db.table = "file_groups", db.operation = "upsert"))]
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_surface(
        &self,
        directory: &str,
        stem: &str,
        primary_path: &str,
        mimetype: &str,
        size: i64,
        title: Option<&str>,
        files: &[String],
    ) -> Result<FileGroup, AppError> {
        let fg = sqlx::query_as::<Postgres, FileGroup>(&format!(
            r#"
            INSERT INTO file_groups (directory, stem, primary_path, mimetype, size, title, files, indexed, deep_indexed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, FALSE)
            ON CONFLICT (directory, stem) DO UPDATE SET
                primary_path = EXCLUDED.primary_path,
                mimetype = EXCLUDED.mimetype,
                size = EXCLUDED.size,
                title = COALESCE(file_groups.title, EXCLUDED.title),
                files = EXCLUDED.files,
                indexed = TRUE,
                deep_indexed = FALSE,
                failure = NULL,
                updated_at = NOW()
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(directory)
        .bind(stem)
        .bind(primary_path)
        .bind(mimetype)
        .bind(size)
        .bind(title)
        .bind(Json(files))
        .fetch_one(&self.pool)
        .await?;
        Ok(fg)
    }

    /// The next batch of groups awaiting deep modeling, oldest first.
    #[tracing::instrument(skip(self), fields(db.table = "file_groups", db.operation = "select"))]
    pub async fn select_unmodeled(&self, limit: i64) -> Result<Vec<FileGroup>, AppError> {
        let groups = sqlx::query_as::<Postgres, FileGroup>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM file_groups
            WHERE indexed AND NOT deep_indexed
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    /// Write back every modeler-mutable field and mark the group deep
    /// indexed. A `failure` note keeps failed rows out of the next batch.
    #[tracing::instrument(skip(self, fg), fields(db.table = "file_groups", db.operation = "update", db.record_id = %fg.id))]
    pub async fn update_modeled(&self, fg: &FileGroup) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE file_groups SET
                title = $2,
                author = $3,
                url = $4,
                published_datetime = $5,
                modified_datetime = $6,
                a_text = $7,
                b_text = $8,
                c_text = $9,
                d_text = $10,
                data = $11,
                model = $12,
                failure = $13,
                deep_indexed = TRUE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(fg.id)
        .bind(&fg.title)
        .bind(&fg.author)
        .bind(&fg.url)
        .bind(fg.published_datetime)
        .bind(fg.modified_datetime)
        .bind(&fg.a_text)
        .bind(&fg.b_text)
        .bind(&fg.c_text)
        .bind(&fg.d_text)
        .bind(Json(&fg.data))
        .bind(&fg.model)
        .bind(&fg.failure)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_groups", db.operation = "update", db.record_id = %id))]
    pub async fn mark_failure(&self, id: Uuid, failure: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE file_groups
            SET deep_indexed = TRUE, failure = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(failure)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All groups directly inside or below any of the given directories.
    #[tracing::instrument(skip(self, directories), fields(db.table = "file_groups", db.operation = "select"))]
    pub async fn list_under_directories(
        &self,
        directories: &[String],
    ) -> Result<Vec<FileGroup>, AppError> {
        let mut groups = Vec::new();
        for directory in directories {
            let prefix = format!("{}/%", directory.trim_end_matches('/'));
            let mut batch = sqlx::query_as::<Postgres, FileGroup>(&format!(
                r#"
                SELECT {ALL_COLUMNS} FROM file_groups
                WHERE directory = $1 OR directory LIKE $2
                "#
            ))
            .bind(directory.trim_end_matches('/'))
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;
            groups.append(&mut batch);
        }
        // Directories may nest; drop duplicates.
        let mut seen = std::collections::HashSet::new();
        groups.retain(|g| seen.insert(g.id));
        Ok(groups)
    }

    /// Rewrite the directory of every group at or below `old` to the
    /// corresponding path under `new`. Relative filenames are untouched.
    #[tracing::instrument(skip(self), fields(db.table = "file_groups", db.operation = "update"))]
    pub async fn move_directory(&self, old: &str, new: &str) -> Result<u64, AppError> {
        let old = old.trim_end_matches('/');
        let new = new.trim_end_matches('/');
        let rows = sqlx::query(
            r#"
            UPDATE file_groups
            SET directory = $2 || substr(directory, length($1) + 1),
                updated_at = NOW()
            WHERE directory = $1 OR directory LIKE $1 || '/%'
            "#,
        )
        .bind(old)
        .bind(new)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "file_groups", db.operation = "delete"))]
    pub async fn delete_ids(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let rows = sqlx::query("DELETE FROM file_groups WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_groups", db.operation = "select"))]
    pub async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<FileGroup>, AppError> {
        let groups = sqlx::query_as::<Postgres, FileGroup>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM file_groups
            ORDER BY created_at DESC, id DESC
            OFFSET $1 LIMIT $2
            "#
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_groups", db.operation = "select"))]
    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_groups")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Attach a data-bag entry without replacing the rest of the bag.
    #[tracing::instrument(skip(self), fields(db.table = "file_groups", db.operation = "update", db.record_id = %id))]
    pub async fn merge_data(
        &self,
        id: Uuid,
        entries: &HashMap<String, String>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE file_groups SET data = data || $2::jsonb, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(entries))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
