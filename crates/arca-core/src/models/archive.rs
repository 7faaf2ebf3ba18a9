use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved HTML page. The singlefile, readability variants, screenshot and
/// info JSON all live in the referenced FileGroup's data bag.
///
/// An archive whose `url` and `archive_datetime` cannot be derived from its
/// files is invalid and gets reaped after refresh.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Archive {
    pub id: Uuid,
    pub file_group_id: Uuid,
    pub collection_id: Option<Uuid>,
    pub url: Option<String>,
    pub archive_datetime: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
