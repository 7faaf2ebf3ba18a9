use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A video channel. Every channel owns exactly one collection of kind
/// `channel`; their lifecycles are coupled.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub url: Option<String>,
    pub directory: Option<String>,
    pub collection_id: Uuid,
    pub created_at: DateTime<Utc>,
}
