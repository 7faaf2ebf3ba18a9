use arca_core::models::{Inventory, InventoryItem};
use arca_core::AppError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const INVENTORY_COLUMNS: &str = "id, name, deleted_at, created_at";
const ITEM_COLUMNS: &str = r#"
    id, inventory_id, brand, name, count, item_size, unit, category,
    subcategory, expiration_date, created_at
"#;

/// An inventory item as supplied by the API or a config file.
#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub brand: Option<String>,
    pub name: String,
    pub count: Decimal,
    pub item_size: Option<Decimal>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "inventories", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Inventory>, AppError> {
        let inventories = sqlx::query_as::<Postgres, Inventory>(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventories WHERE deleted_at IS NULL ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(inventories)
    }

    #[tracing::instrument(skip(self), fields(db.table = "inventories", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Inventory>, AppError> {
        let inventory = sqlx::query_as::<Postgres, Inventory>(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inventory)
    }

    /// Create an inventory by name, first removing any soft-deleted
    /// inventories that share the name so it can be reused.
    #[tracing::instrument(skip(self), fields(db.table = "inventories", db.operation = "insert"))]
    pub async fn create(&self, name: &str) -> Result<Inventory, AppError> {
        let name = name.trim();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM inventories WHERE name = $1 AND deleted_at IS NOT NULL")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        let existing: Option<Inventory> = sqlx::query_as::<Postgres, Inventory>(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventories WHERE name = $1 AND deleted_at IS NULL"
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "Inventory {} already exists",
                name
            )));
        }

        let inventory = sqlx::query_as::<Postgres, Inventory>(&format!(
            "INSERT INTO inventories (name) VALUES ($1) RETURNING {INVENTORY_COLUMNS}"
        ))
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inventory)
    }

    /// Create or resurrect an inventory from config; returns the live row.
    #[tracing::instrument(skip(self), fields(db.table = "inventories", db.operation = "upsert"))]
    pub async fn upsert_by_name(&self, name: &str) -> Result<Inventory, AppError> {
        let name = name.trim();
        let existing: Option<Inventory> = sqlx::query_as::<Postgres, Inventory>(&format!(
            r#"
            UPDATE inventories SET deleted_at = NULL
            WHERE name = $1
            RETURNING {INVENTORY_COLUMNS}
            "#
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(inventory) = existing {
            return Ok(inventory);
        }

        let inventory = sqlx::query_as::<Postgres, Inventory>(&format!(
            "INSERT INTO inventories (name) VALUES ($1) RETURNING {INVENTORY_COLUMNS}"
        ))
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(inventory)
    }

    /// Soft-delete inventories whose names are not in `keep`.
    #[tracing::instrument(skip(self, keep), fields(db.table = "inventories", db.operation = "update"))]
    pub async fn soft_delete_missing(&self, keep: &[String]) -> Result<u64, AppError> {
        let rows = sqlx::query(
            r#"
            UPDATE inventories SET deleted_at = NOW()
            WHERE deleted_at IS NULL AND NOT (name = ANY($1))
            "#,
        )
        .bind(keep)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "inventories", db.operation = "update", db.record_id = %id))]
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let rows =
            sqlx::query("UPDATE inventories SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(rows > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "inventory_items", db.operation = "select"))]
    pub async fn items(&self, inventory_id: Uuid) -> Result<Vec<InventoryItem>, AppError> {
        let items = sqlx::query_as::<Postgres, InventoryItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM inventory_items
            WHERE inventory_id = $1
            ORDER BY category ASC NULLS LAST, subcategory ASC NULLS LAST, name ASC
            "#
        ))
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Replace every item of an inventory. Config import is whole-list.
    #[tracing::instrument(skip(self, items), fields(db.table = "inventory_items", db.operation = "update"))]
    pub async fn replace_items(
        &self,
        inventory_id: Uuid,
        items: &[NewInventoryItem],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM inventory_items WHERE inventory_id = $1")
            .bind(inventory_id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO inventory_items
                    (inventory_id, brand, name, count, item_size, unit, category, subcategory, expiration_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(inventory_id)
            .bind(&item.brand)
            .bind(&item.name)
            .bind(item.count)
            .bind(item.item_size)
            .bind(&item.unit)
            .bind(&item.category)
            .bind(&item.subcategory)
            .bind(item.expiration_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
