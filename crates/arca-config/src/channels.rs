//! channels.yaml mirror
//!
//! A channel entry couples a Channel row with its Collection of kind
//! `channel`; both are created, updated and deleted together.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arca_core::models::CollectionKind;
use arca_core::{AppConfig, AppError, RuntimeFlags};
use arca_db::{ChannelRepository, CollectionRepository, ConfigVersionRepository, TagRepository};

use crate::mirror::{
    check_wrol_mode, config_path, next_version, read_config_file, remove_config_file,
    write_config_file, ConfigMirror,
};

#[derive(Debug, Serialize, Deserialize)]
struct ChannelsDoc {
    #[serde(default)]
    version: i32,
    #[serde(default)]
    channels: Vec<ChannelEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChannelEntry {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag_name: Option<String>,
}

pub struct ChannelsConfig {
    config: AppConfig,
    flags: RuntimeFlags,
    channels: ChannelRepository,
    collections: CollectionRepository,
    tags: TagRepository,
    versions: ConfigVersionRepository,
}

impl ChannelsConfig {
    pub fn new(
        config: AppConfig,
        flags: RuntimeFlags,
        channels: ChannelRepository,
        collections: CollectionRepository,
        tags: TagRepository,
        versions: ConfigVersionRepository,
    ) -> Self {
        Self {
            config,
            flags,
            channels,
            collections,
            tags,
            versions,
        }
    }

    async fn import_entry(&self, entry: &ChannelEntry) -> Result<(), AppError> {
        let tag_id = match &entry.tag_name {
            Some(tag_name) => Some(self.tags.find_or_create(tag_name, None).await?.id),
            None => None,
        };

        let collection = self
            .collections
            .upsert_from_config(
                &entry.name,
                CollectionKind::Channel,
                entry.directory.as_deref(),
                tag_id,
                None,
                None,
            )
            .await?;

        match self.channels.get_by_name(&entry.name).await? {
            Some(channel) => {
                self.channels
                    .update(channel.id, entry.url.as_deref(), entry.directory.as_deref())
                    .await?;
            }
            None => {
                self.channels
                    .create(
                        &entry.name,
                        entry.url.as_deref(),
                        entry.directory.as_deref(),
                        collection.id,
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigMirror for ChannelsConfig {
    fn name(&self) -> &'static str {
        "channels"
    }

    fn file_name(&self) -> &'static str {
        "channels.yaml"
    }

    async fn import_config(&self) -> Result<(), AppError> {
        let path = config_path(&self.config, self.file_name());
        let Some(doc) = read_config_file::<ChannelsDoc>(&path)? else {
            tracing::info!("No channels config file, keeping DB state");
            return Ok(());
        };
        if doc.channels.is_empty() {
            tracing::info!("Channels config is empty, keeping DB state");
            return Ok(());
        }

        let mut names = Vec::with_capacity(doc.channels.len());
        for entry in &doc.channels {
            if let Err(e) = self.import_entry(entry).await {
                tracing::error!(channel = %entry.name, error = %e, "Cannot import channel entry");
                continue;
            }
            names.push(entry.name.clone());
        }

        // Delete-on-removal: a removed channel takes its collection along.
        for channel in self.channels.list_missing(&names).await? {
            tracing::info!(channel = %channel.name, "Deleting channel removed from config");
            // The channel row cascades from its collection.
            self.collections.delete(channel.collection_id).await?;
        }

        self.versions.set(self.name(), doc.version).await?;
        Ok(())
    }

    async fn dump_config(&self) -> Result<(), AppError> {
        check_wrol_mode(&self.config, &self.flags)?;
        let path = config_path(&self.config, self.file_name());
        let channels = self.channels.list().await?;
        if channels.is_empty() {
            return remove_config_file(&path);
        }

        let mut entries = Vec::with_capacity(channels.len());
        for channel in channels {
            let collection = self.collections.get(channel.collection_id).await?;
            let tag_name = match collection.as_ref().and_then(|c| c.tag_id) {
                Some(tag_id) => self.tags.get(tag_id).await?.map(|t| t.name),
                None => None,
            };
            entries.push(ChannelEntry {
                name: channel.name,
                url: channel.url,
                directory: channel.directory,
                tag_name,
            });
        }

        let version = next_version(&self.versions, self.name(), &path).await?;
        let doc = ChannelsDoc {
            version,
            channels: entries,
        };
        write_config_file(&path, &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_parses_with_tag() {
        let doc: ChannelsDoc = serde_yaml::from_str(
            r#"
version: 2
channels:
  - name: SomeChannel
    url: https://youtube.com/@somechannel
    directory: /m/videos/lectures/SomeChannel
    tag_name: lectures
"#,
        )
        .unwrap();
        let entry = &doc.channels[0];
        assert_eq!(entry.name, "SomeChannel");
        assert_eq!(entry.tag_name.as_deref(), Some("lectures"));
    }

    #[test]
    fn optional_fields_are_omitted_from_dump() {
        let doc = ChannelsDoc {
            version: 1,
            channels: vec![ChannelEntry {
                name: "C".to_string(),
                url: None,
                directory: None,
                tag_name: None,
            }],
        };
        let dumped = serde_yaml::to_string(&doc).unwrap();
        assert!(!dumped.contains("url"));
        assert!(!dumped.contains("tag_name"));
    }
}
