use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named inventory of physical items. Soft-deleted so config imports can
/// resurrect an inventory without losing its items.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Inventory {
    pub id: Uuid,
    pub name: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub brand: Option<String>,
    pub name: String,
    pub count: Decimal,
    pub item_size: Option<Decimal>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}
