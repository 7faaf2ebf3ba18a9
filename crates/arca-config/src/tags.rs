//! tags.yaml mirror

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arca_core::{AppConfig, AppError, RuntimeFlags};
use arca_db::{ConfigVersionRepository, TagRepository};

use crate::mirror::{
    check_wrol_mode, config_path, next_version, read_config_file, remove_config_file,
    write_config_file, ConfigMirror,
};

#[derive(Debug, Serialize, Deserialize)]
struct TagsDoc {
    #[serde(default)]
    version: i32,
    #[serde(default)]
    tags: Vec<TagEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
}

pub struct TagsConfig {
    config: AppConfig,
    flags: RuntimeFlags,
    tags: TagRepository,
    versions: ConfigVersionRepository,
}

impl TagsConfig {
    pub fn new(
        config: AppConfig,
        flags: RuntimeFlags,
        tags: TagRepository,
        versions: ConfigVersionRepository,
    ) -> Self {
        Self {
            config,
            flags,
            tags,
            versions,
        }
    }
}

#[async_trait]
impl ConfigMirror for TagsConfig {
    fn name(&self) -> &'static str {
        "tags"
    }

    fn file_name(&self) -> &'static str {
        "tags.yaml"
    }

    async fn import_config(&self) -> Result<(), AppError> {
        let path = config_path(&self.config, self.file_name());
        let Some(doc) = read_config_file::<TagsDoc>(&path)? else {
            tracing::info!("No tags config file, keeping DB state");
            return Ok(());
        };
        if doc.tags.is_empty() {
            tracing::info!("Tags config is empty, keeping DB state");
            return Ok(());
        }

        let mut names = Vec::with_capacity(doc.tags.len());
        for entry in &doc.tags {
            self.tags.upsert(&entry.name, entry.color.as_deref()).await?;
            names.push(entry.name.clone());
        }
        self.tags.delete_missing(&names).await?;
        self.versions.set(self.name(), doc.version).await?;
        Ok(())
    }

    async fn dump_config(&self) -> Result<(), AppError> {
        check_wrol_mode(&self.config, &self.flags)?;
        let path = config_path(&self.config, self.file_name());
        let tags = self.tags.list().await?;
        if tags.is_empty() {
            return remove_config_file(&path);
        }

        let version = next_version(&self.versions, self.name(), &path).await?;
        let doc = TagsDoc {
            version,
            tags: tags
                .into_iter()
                .map(|t| TagEntry {
                    name: t.name,
                    color: t.color,
                })
                .collect(),
        };
        write_config_file(&path, &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_parses_without_color() {
        let doc: TagsDoc = serde_yaml::from_str("version: 2\ntags:\n  - name: news\n").unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.tags.len(), 1);
        assert_eq!(doc.tags[0].name, "news");
        assert_eq!(doc.tags[0].color, None);
    }

    #[test]
    fn empty_doc_defaults() {
        let doc: TagsDoc = serde_yaml::from_str("{}").unwrap();
        assert_eq!(doc.version, 0);
        assert!(doc.tags.is_empty());
    }
}
