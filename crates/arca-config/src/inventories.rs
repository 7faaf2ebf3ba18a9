//! inventories.yaml mirror
//!
//! Inventories are soft-deleted on removal so a later import can resurrect
//! one without losing its items.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use arca_core::models::InventoryItem;
use arca_core::{AppConfig, AppError, RuntimeFlags};
use arca_db::inventory::NewInventoryItem;
use arca_db::{ConfigVersionRepository, InventoryRepository};

use crate::mirror::{
    check_wrol_mode, config_path, next_version, read_config_file, remove_config_file,
    write_config_file, ConfigMirror,
};

#[derive(Debug, Serialize, Deserialize)]
struct InventoriesDoc {
    #[serde(default)]
    version: i32,
    #[serde(default)]
    inventories: Vec<InventoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InventoryEntry {
    name: String,
    #[serde(default)]
    items: Vec<ItemEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ItemEntry {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    brand: Option<String>,
    count: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item_size: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiration_date: Option<NaiveDate>,
}

impl From<&InventoryItem> for ItemEntry {
    fn from(item: &InventoryItem) -> Self {
        Self {
            name: item.name.clone(),
            brand: item.brand.clone(),
            count: item.count,
            item_size: item.item_size,
            unit: item.unit.clone(),
            category: item.category.clone(),
            subcategory: item.subcategory.clone(),
            expiration_date: item.expiration_date,
        }
    }
}

impl From<&ItemEntry> for NewInventoryItem {
    fn from(entry: &ItemEntry) -> Self {
        Self {
            brand: entry.brand.clone(),
            name: entry.name.clone(),
            count: entry.count,
            item_size: entry.item_size,
            unit: entry.unit.clone(),
            category: entry.category.clone(),
            subcategory: entry.subcategory.clone(),
            expiration_date: entry.expiration_date,
        }
    }
}

pub struct InventoriesConfig {
    config: AppConfig,
    flags: RuntimeFlags,
    inventories: InventoryRepository,
    versions: ConfigVersionRepository,
}

impl InventoriesConfig {
    pub fn new(
        config: AppConfig,
        flags: RuntimeFlags,
        inventories: InventoryRepository,
        versions: ConfigVersionRepository,
    ) -> Self {
        Self {
            config,
            flags,
            inventories,
            versions,
        }
    }
}

#[async_trait]
impl ConfigMirror for InventoriesConfig {
    fn name(&self) -> &'static str {
        "inventories"
    }

    fn file_name(&self) -> &'static str {
        "inventories.yaml"
    }

    async fn import_config(&self) -> Result<(), AppError> {
        let path = config_path(&self.config, self.file_name());
        let Some(doc) = read_config_file::<InventoriesDoc>(&path)? else {
            tracing::info!("No inventories config file, keeping DB state");
            return Ok(());
        };
        if doc.inventories.is_empty() {
            tracing::info!("Inventories config is empty, keeping DB state");
            return Ok(());
        }

        let mut names = Vec::with_capacity(doc.inventories.len());
        for entry in &doc.inventories {
            let inventory = self.inventories.upsert_by_name(&entry.name).await?;
            let items: Vec<NewInventoryItem> =
                entry.items.iter().map(NewInventoryItem::from).collect();
            self.inventories.replace_items(inventory.id, &items).await?;
            names.push(inventory.name);
        }

        // Soft delete-on-removal.
        self.inventories.soft_delete_missing(&names).await?;
        self.versions.set(self.name(), doc.version).await?;
        Ok(())
    }

    async fn dump_config(&self) -> Result<(), AppError> {
        check_wrol_mode(&self.config, &self.flags)?;
        let path = config_path(&self.config, self.file_name());
        let inventories = self.inventories.list().await?;
        if inventories.is_empty() {
            return remove_config_file(&path);
        }

        let mut entries = Vec::with_capacity(inventories.len());
        for inventory in inventories {
            let items = self.inventories.items(inventory.id).await?;
            entries.push(InventoryEntry {
                name: inventory.name,
                items: items.iter().map(ItemEntry::from).collect(),
            });
        }

        let version = next_version(&self.versions, self.name(), &path).await?;
        let doc = InventoriesDoc {
            version,
            inventories: entries,
        };
        write_config_file(&path, &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_parse_with_decimal_counts() {
        let doc: InventoriesDoc = serde_yaml::from_str(
            r#"
version: 1
inventories:
  - name: Food Storage
    items:
      - name: rice
        count: 25.5
        unit: pounds
        category: grains
      - name: salt
        count: 2
"#,
        )
        .unwrap();
        let entry = &doc.inventories[0];
        assert_eq!(entry.name, "Food Storage");
        assert_eq!(entry.items.len(), 2);
        assert_eq!(entry.items[0].count.to_string(), "25.5");
        assert_eq!(entry.items[1].count.to_string(), "2");
    }

    #[test]
    fn expiration_dates_parse_as_iso_dates() {
        let doc: InventoriesDoc = serde_yaml::from_str(
            r#"
version: 2
inventories:
  - name: Food Storage
    items:
      - name: canned beans
        count: 12
        expiration_date: 2027-06-30
"#,
        )
        .unwrap();
        let item = &doc.inventories[0].items[0];
        assert_eq!(
            item.expiration_date,
            Some(chrono::NaiveDate::from_ymd_opt(2027, 6, 30).unwrap())
        );

        let dumped = serde_yaml::to_string(&doc).unwrap();
        assert!(dumped.contains("2027-06-30"));
    }

    #[test]
    fn inventory_without_items_parses() {
        let doc: InventoriesDoc =
            serde_yaml::from_str("version: 1\ninventories:\n  - name: Empty\n").unwrap();
        assert!(doc.inventories[0].items.is_empty());
    }
}
