use arca_core::models::Channel;
use arca_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const ALL_COLUMNS: &str = r#"
    id, name, url, directory, collection_id, created_at
"#;

#[derive(Clone)]
pub struct ChannelRepository {
    pool: PgPool,
}

impl ChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Channel>, AppError> {
        let channel = sqlx::query_as::<Postgres, Channel>(&format!(
            "SELECT {ALL_COLUMNS} FROM channels WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "select"))]
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Channel>, AppError> {
        let channel = sqlx::query_as::<Postgres, Channel>(&format!(
            "SELECT {ALL_COLUMNS} FROM channels WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "select"))]
    pub async fn get_by_collection(&self, collection_id: Uuid) -> Result<Option<Channel>, AppError> {
        let channel = sqlx::query_as::<Postgres, Channel>(&format!(
            "SELECT {ALL_COLUMNS} FROM channels WHERE collection_id = $1"
        ))
        .bind(collection_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "select"))]
    pub async fn get_by_directory(&self, directory: &str) -> Result<Option<Channel>, AppError> {
        let channel = sqlx::query_as::<Postgres, Channel>(&format!(
            "SELECT {ALL_COLUMNS} FROM channels WHERE directory = $1"
        ))
        .bind(directory)
        .fetch_optional(&self.pool)
        .await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "insert"))]
    pub async fn create(
        &self,
        name: &str,
        url: Option<&str>,
        directory: Option<&str>,
        collection_id: Uuid,
    ) -> Result<Channel, AppError> {
        let channel = sqlx::query_as::<Postgres, Channel>(&format!(
            r#"
            INSERT INTO channels (name, url, directory, collection_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(url)
        .bind(directory)
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Channel {} already exists", name))
            }
            other => AppError::Database(other),
        })?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        url: Option<&str>,
        directory: Option<&str>,
    ) -> Result<Channel, AppError> {
        let channel = sqlx::query_as::<Postgres, Channel>(&format!(
            r#"
            UPDATE channels
            SET url = $2, directory = $3
            WHERE id = $1
            RETURNING {ALL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(url)
        .bind(directory)
        .fetch_one(&self.pool)
        .await?;
        Ok(channel)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Channel>, AppError> {
        let channels = sqlx::query_as::<Postgres, Channel>(&format!(
            "SELECT {ALL_COLUMNS} FROM channels ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }

    #[tracing::instrument(skip(self), fields(db.table = "channels", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows = sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    /// Channels whose name is not in `keep`; their coupled collections are
    /// removed by the caller. Used by config import delete-on-removal.
    #[tracing::instrument(skip(self, keep), fields(db.table = "channels", db.operation = "select"))]
    pub async fn list_missing(&self, keep: &[String]) -> Result<Vec<Channel>, AppError> {
        let channels = sqlx::query_as::<Postgres, Channel>(&format!(
            "SELECT {ALL_COLUMNS} FROM channels WHERE NOT (name = ANY($1))"
        ))
        .bind(keep)
        .fetch_all(&self.pool)
        .await?;
        Ok(channels)
    }
}
