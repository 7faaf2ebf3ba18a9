use arca_core::models::{Collection, CollectionKind};
use arca_core::AppError;
use serde::Serialize;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const ALL_COLUMNS: &str = r#"
    id, name, kind, directory, tag_id, description, file_format, created_at, updated_at
"#;

/// Per-kind statistics attached to collection listings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionStats {
    pub item_count: i64,
    pub size: i64,
    pub min_download_frequency: Option<i64>,
}

#[derive(Clone)]
pub struct CollectionRepository {
    pool: PgPool,
}

impl CollectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Collection>, AppError> {
        let collection = sqlx::query_as::<Postgres, Collection>(&format!(
            "SELECT {ALL_COLUMNS} FROM collections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(collection)
    }

    /// Find a collection by id, erroring when missing.
    pub async fn find(&self, id: Uuid) -> Result<Collection, AppError> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cannot find collection with id {}", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select"))]
    pub async fn get_by_name(
        &self,
        name: &str,
        kind: CollectionKind,
    ) -> Result<Option<Collection>, AppError> {
        let collection = sqlx::query_as::<Postgres, Collection>(&format!(
            "SELECT {ALL_COLUMNS} FROM collections WHERE name = $1 AND kind = $2"
        ))
        .bind(name)
        .bind(kind.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(collection)
    }

    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select"))]
    pub async fn get_by_directory(&self, directory: &str) -> Result<Option<Collection>, AppError> {
        let collection = sqlx::query_as::<Postgres, Collection>(&format!(
            "SELECT {ALL_COLUMNS} FROM collections WHERE directory = $1"
        ))
        .bind(directory)
        .fetch_optional(&self.pool)
        .await?;
        Ok(collection)
    }

    /// Get a collection by `(name, kind)`, creating it when missing.
    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "upsert"))]
    pub async fn find_or_create(
        &self,
        name: &str,
        kind: CollectionKind,
        directory: Option<&str>,
    ) -> Result<Collection, AppError> {
        let collection = sqlx::query_as::<Postgres, Collection>(&format!(
            r#"
            INSERT INTO collections (name, kind, directory)
            VALUES ($1, $2, $3)
            ON CONFLICT (name, kind) DO UPDATE SET name = EXCLUDED.name
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(kind.to_string())
        .bind(directory)
        .fetch_one(&self.pool)
        .await?;
        Ok(collection)
    }

    /// Create or update from config; config values win over DB values.
    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "upsert"))]
    pub async fn upsert_from_config(
        &self,
        name: &str,
        kind: CollectionKind,
        directory: Option<&str>,
        tag_id: Option<Uuid>,
        description: Option<&str>,
        file_format: Option<&str>,
    ) -> Result<Collection, AppError> {
        let collection = sqlx::query_as::<Postgres, Collection>(&format!(
            r#"
            INSERT INTO collections (name, kind, directory, tag_id, description, file_format)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name, kind) DO UPDATE SET
                directory = EXCLUDED.directory,
                tag_id = EXCLUDED.tag_id,
                description = EXCLUDED.description,
                file_format = EXCLUDED.file_format,
                updated_at = NOW()
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(kind.to_string())
        .bind(directory)
        .bind(tag_id)
        .bind(description)
        .bind(file_format)
        .fetch_one(&self.pool)
        .await?;
        Ok(collection)
    }

    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select"))]
    pub async fn list(&self, kind: Option<CollectionKind>) -> Result<Vec<Collection>, AppError> {
        let collections = match kind {
            Some(kind) => {
                sqlx::query_as::<Postgres, Collection>(&format!(
                    "SELECT {ALL_COLUMNS} FROM collections WHERE kind = $1 ORDER BY name ASC"
                ))
                .bind(kind.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<Postgres, Collection>(&format!(
                    "SELECT {ALL_COLUMNS} FROM collections ORDER BY name ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(collections)
    }

    /// Search by kind, tag names, and a case-insensitive name substring.
    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select"))]
    pub async fn search(
        &self,
        kind: Option<CollectionKind>,
        tag_names: Option<&[String]>,
        search_str: Option<&str>,
    ) -> Result<Vec<Collection>, AppError> {
        let pattern = search_str.map(|s| format!("%{}%", s));
        let collections = sqlx::query_as::<Postgres, Collection>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM collections c
            WHERE ($1::text IS NULL OR c.kind = $1)
              AND ($2::text[] IS NULL OR c.tag_id IN (SELECT id FROM tags WHERE name = ANY($2)))
              AND ($3::text IS NULL OR c.name ILIKE $3)
            ORDER BY c.name ASC
            "#
        ))
        .bind(kind.map(|k| k.to_string()))
        .bind(tag_names)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(collections)
    }

    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        directory: Option<Option<&str>>,
        tag_id: Option<Option<Uuid>>,
        description: Option<&str>,
    ) -> Result<Collection, AppError> {
        let current = self.find(id).await?;
        let directory = directory.unwrap_or(current.directory.as_deref());
        let tag_id = tag_id.unwrap_or(current.tag_id);
        let description = description.or(current.description.as_deref());

        let collection = sqlx::query_as::<Postgres, Collection>(&format!(
            r#"
            UPDATE collections
            SET directory = $2, tag_id = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(directory)
        .bind(tag_id)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(collection)
    }

    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "update", db.record_id = %id))]
    pub async fn set_tag_and_directory(
        &self,
        id: Uuid,
        tag_id: Option<Uuid>,
        directory: Option<&str>,
    ) -> Result<Collection, AppError> {
        let collection = sqlx::query_as::<Postgres, Collection>(&format!(
            r#"
            UPDATE collections
            SET tag_id = $2, directory = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tag_id)
        .bind(directory)
        .fetch_one(&self.pool)
        .await?;
        Ok(collection)
    }

    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    /// Delete collections of `kind` whose `(name)` is not in `keep`.
    /// Used by config import delete-on-removal.
    #[tracing::instrument(skip(self, keep), fields(db.table = "collections", db.operation = "delete"))]
    pub async fn delete_missing(
        &self,
        kind: CollectionKind,
        keep: &[String],
    ) -> Result<u64, AppError> {
        let rows = sqlx::query("DELETE FROM collections WHERE kind = $1 AND NOT (name = ANY($2))")
            .bind(kind.to_string())
            .bind(keep)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows)
    }

    /// Statistics for one collection: archive or video count plus total file
    /// size, and the minimum recurring download frequency.
    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select", db.record_id = %collection.id))]
    pub async fn stats(&self, collection: &Collection) -> Result<CollectionStats, AppError> {
        let (item_count, size): (i64, Option<i64>) = match collection.kind {
            CollectionKind::Domain => {
                sqlx::query_as(
                    r#"
                    SELECT COUNT(a.id), SUM(fg.size)::bigint
                    FROM archives a
                    LEFT JOIN file_groups fg ON fg.id = a.file_group_id
                    WHERE a.collection_id = $1
                    "#,
                )
                .bind(collection.id)
                .fetch_one(&self.pool)
                .await?
            }
            CollectionKind::Channel => {
                sqlx::query_as(
                    r#"
                    SELECT COUNT(v.id), SUM(fg.size)::bigint
                    FROM videos v
                    JOIN channels ch ON ch.id = v.channel_id
                    LEFT JOIN file_groups fg ON fg.id = v.file_group_id
                    WHERE ch.collection_id = $1
                    "#,
                )
                .bind(collection.id)
                .fetch_one(&self.pool)
                .await?
            }
            CollectionKind::Manual => (0, None),
        };

        let min_download_frequency: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MIN(frequency_seconds) FROM downloads
            WHERE collection_id = $1 AND frequency_seconds IS NOT NULL AND frequency_seconds > 0
            "#,
        )
        .bind(collection.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CollectionStats {
            item_count,
            size: size.unwrap_or(0),
            min_download_frequency,
        })
    }

    /// Domain collections with no archives and no downloads. Candidates for
    /// the after-refresh cleanup hook.
    #[tracing::instrument(skip(self), fields(db.table = "collections", db.operation = "select"))]
    pub async fn list_empty_domains(&self) -> Result<Vec<Collection>, AppError> {
        let collections = sqlx::query_as::<Postgres, Collection>(&format!(
            r#"
            SELECT {ALL_COLUMNS} FROM collections c
            WHERE c.kind = 'domain'
              AND NOT EXISTS (SELECT 1 FROM archives a WHERE a.collection_id = c.id)
              AND NOT EXISTS (SELECT 1 FROM downloads d WHERE d.collection_id = c.id)
            "#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(collections)
    }
}
