use arca_core::AppError;
use sqlx::PgPool;

/// Tracks the DB-known version of each mirrored config file. Dumps bump the
/// version; a dump whose incoming version is behind the DB-known one fails
/// so a stale process cannot overwrite newer state.
#[derive(Clone)]
pub struct ConfigVersionRepository {
    pool: PgPool,
}

impl ConfigVersionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "config_versions", db.operation = "select"))]
    pub async fn get(&self, name: &str) -> Result<i32, AppError> {
        let version: Option<i32> =
            sqlx::query_scalar("SELECT version FROM config_versions WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.unwrap_or(0))
    }

    #[tracing::instrument(skip(self), fields(db.table = "config_versions", db.operation = "upsert"))]
    pub async fn set(&self, name: &str, version: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO config_versions (name, version)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET version = EXCLUDED.version
            "#,
        )
        .bind(name)
        .bind(version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Validate an incoming version against the DB-known one and advance to
    /// `incoming + 1`. Fresh configs start at version 1.
    #[tracing::instrument(skip(self), fields(db.table = "config_versions", db.operation = "update"))]
    pub async fn bump(&self, name: &str, incoming: i32) -> Result<i32, AppError> {
        let current = self.get(name).await?;
        if incoming < current {
            return Err(AppError::ConfigVersionMismatch {
                name: name.to_string(),
                incoming,
                current,
            });
        }
        let next = incoming + 1;
        self.set(name, next).await?;
        Ok(next)
    }
}
