//! domains.yaml mirror
//!
//! Domain collections mirror to one entry per domain: directory plus an
//! optional tag name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arca_core::models::CollectionKind;
use arca_core::{AppConfig, AppError, RuntimeFlags};
use arca_db::{CollectionRepository, ConfigVersionRepository, TagRepository};

use crate::mirror::{
    check_wrol_mode, config_path, next_version, read_config_file, remove_config_file,
    write_config_file, ConfigMirror,
};

#[derive(Debug, Serialize, Deserialize)]
struct DomainsDoc {
    #[serde(default)]
    version: i32,
    #[serde(default)]
    domains: Vec<DomainEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DomainEntry {
    domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_format: Option<String>,
}

pub struct DomainsConfig {
    config: AppConfig,
    flags: RuntimeFlags,
    collections: CollectionRepository,
    tags: TagRepository,
    versions: ConfigVersionRepository,
}

impl DomainsConfig {
    pub fn new(
        config: AppConfig,
        flags: RuntimeFlags,
        collections: CollectionRepository,
        tags: TagRepository,
        versions: ConfigVersionRepository,
    ) -> Self {
        Self {
            config,
            flags,
            collections,
            tags,
            versions,
        }
    }
}

#[async_trait]
impl ConfigMirror for DomainsConfig {
    fn name(&self) -> &'static str {
        "domains"
    }

    fn file_name(&self) -> &'static str {
        "domains.yaml"
    }

    async fn import_config(&self) -> Result<(), AppError> {
        let path = config_path(&self.config, self.file_name());
        let Some(doc) = read_config_file::<DomainsDoc>(&path)? else {
            tracing::info!("No domains config file, keeping DB state");
            return Ok(());
        };
        if doc.domains.is_empty() {
            tracing::info!("Domains config is empty, keeping DB state");
            return Ok(());
        }

        let mut names = Vec::with_capacity(doc.domains.len());
        for entry in &doc.domains {
            let tag_id = match &entry.tag_name {
                Some(tag_name) => Some(self.tags.find_or_create(tag_name, None).await?.id),
                None => None,
            };
            let result = self
                .collections
                .upsert_from_config(
                    &entry.domain,
                    CollectionKind::Domain,
                    entry.directory.as_deref(),
                    tag_id,
                    None,
                    entry.file_format.as_deref(),
                )
                .await;
            if let Err(e) = result {
                tracing::error!(domain = %entry.domain, error = %e, "Cannot import domain entry");
                continue;
            }
            names.push(entry.domain.clone());
        }

        // Delete-on-removal; archives are orphaned by the FK, not deleted.
        self.collections
            .delete_missing(CollectionKind::Domain, &names)
            .await?;

        self.versions.set(self.name(), doc.version).await?;
        Ok(())
    }

    async fn dump_config(&self) -> Result<(), AppError> {
        check_wrol_mode(&self.config, &self.flags)?;
        let path = config_path(&self.config, self.file_name());
        let collections = self.collections.list(Some(CollectionKind::Domain)).await?;
        if collections.is_empty() {
            return remove_config_file(&path);
        }

        let mut entries = Vec::with_capacity(collections.len());
        for collection in collections {
            let tag_name = match collection.tag_id {
                Some(tag_id) => self.tags.get(tag_id).await?.map(|t| t.name),
                None => None,
            };
            entries.push(DomainEntry {
                domain: collection.name,
                directory: collection.directory,
                tag_name,
                file_format: collection.file_format,
            });
        }

        let version = next_version(&self.versions, self.name(), &path).await?;
        let doc = DomainsDoc {
            version,
            domains: entries,
        };
        write_config_file(&path, &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_parses() {
        let doc: DomainsDoc = serde_yaml::from_str(
            r#"
version: 5
domains:
  - domain: example.com
    directory: /m/archive/news/example.com
    tag_name: news
  - domain: plain.org
"#,
        )
        .unwrap();
        assert_eq!(doc.domains.len(), 2);
        assert_eq!(doc.domains[0].tag_name.as_deref(), Some("news"));
        assert_eq!(doc.domains[1].directory, None);
    }

    #[test]
    fn dump_shape_matches_import() {
        let doc = DomainsDoc {
            version: 1,
            domains: vec![DomainEntry {
                domain: "example.com".to_string(),
                directory: Some("/m/archive/example.com".to_string()),
                tag_name: None,
                file_format: None,
            }],
        };
        let dumped = serde_yaml::to_string(&doc).unwrap();
        let parsed: DomainsDoc = serde_yaml::from_str(&dumped).unwrap();
        assert_eq!(parsed.domains[0].domain, "example.com");
    }
}
