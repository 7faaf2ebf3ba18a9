use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved video. Info JSON, poster and caption files live in the referenced
/// FileGroup's data bag.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: Uuid,
    pub file_group_id: Uuid,
    pub channel_id: Option<Uuid>,
    /// The source service's own id for this video.
    pub source_id: Option<String>,
    pub upload_date: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
    pub view_count: Option<i64>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}
