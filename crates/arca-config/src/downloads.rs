//! download_manager.yaml mirror

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arca_core::models::Download;
use arca_core::{AppConfig, AppError, RuntimeFlags};
use arca_db::{ConfigVersionRepository, DownloadRepository};

use crate::mirror::{
    check_wrol_mode, config_path, next_version, read_config_file, remove_config_file,
    write_config_file, ConfigMirror,
};

#[derive(Debug, Serialize, Deserialize)]
struct DownloadsDoc {
    #[serde(default)]
    version: i32,
    #[serde(default)]
    downloads: Vec<DownloadEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DownloadEntry {
    url: String,
    downloader: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_downloader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frequency_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tag_names: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    settings: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_download: Option<DateTime<Utc>>,
}

impl From<&Download> for DownloadEntry {
    fn from(download: &Download) -> Self {
        Self {
            url: download.url.clone(),
            downloader: download.downloader.clone(),
            sub_downloader: download.sub_downloader.clone(),
            destination: download.destination.clone(),
            frequency_seconds: download.frequency_seconds,
            tag_names: download.tag_names.clone(),
            settings: download.settings.clone(),
            next_download: download.next_download,
        }
    }
}

pub struct DownloadsConfig {
    config: AppConfig,
    flags: RuntimeFlags,
    downloads: DownloadRepository,
    versions: ConfigVersionRepository,
}

impl DownloadsConfig {
    pub fn new(
        config: AppConfig,
        flags: RuntimeFlags,
        downloads: DownloadRepository,
        versions: ConfigVersionRepository,
    ) -> Self {
        Self {
            config,
            flags,
            downloads,
            versions,
        }
    }
}

#[async_trait]
impl ConfigMirror for DownloadsConfig {
    fn name(&self) -> &'static str {
        "download_manager"
    }

    fn file_name(&self) -> &'static str {
        "download_manager.yaml"
    }

    async fn import_config(&self) -> Result<(), AppError> {
        let path = config_path(&self.config, self.file_name());
        let Some(doc) = read_config_file::<DownloadsDoc>(&path)? else {
            tracing::info!("No download manager config file, keeping DB state");
            return Ok(());
        };
        if doc.downloads.is_empty() {
            tracing::info!("Download manager config is empty, keeping DB state");
            return Ok(());
        }

        let mut urls = Vec::with_capacity(doc.downloads.len());
        for entry in &doc.downloads {
            // Creation is idempotent per active URL; a bad entry is logged
            // and skipped rather than aborting the whole import.
            let settings = if entry.settings.is_null() {
                serde_json::Value::Object(Default::default())
            } else {
                entry.settings.clone()
            };
            let result = self
                .downloads
                .create(
                    &entry.url,
                    &entry.downloader,
                    entry.sub_downloader.as_deref(),
                    entry.destination.as_deref(),
                    entry.frequency_seconds,
                    settings,
                    &entry.tag_names,
                    None,
                )
                .await;
            if let Err(e) = result {
                tracing::error!(url = %entry.url, error = %e, "Cannot import download entry");
                continue;
            }
            urls.push(entry.url.clone());
        }

        // Delete-on-removal: recurring downloads absent from the config are
        // no longer wanted.
        let existing = self.downloads.list_for_config().await?;
        let stale: Vec<uuid::Uuid> = existing
            .iter()
            .filter(|d| d.is_recurring() && !d.status.is_terminal())
            .filter(|d| !urls.contains(&d.url))
            .map(|d| d.id)
            .collect();
        self.downloads.delete_ids(&stale).await?;

        self.versions.set(self.name(), doc.version).await?;
        Ok(())
    }

    async fn dump_config(&self) -> Result<(), AppError> {
        check_wrol_mode(&self.config, &self.flags)?;
        let path = config_path(&self.config, self.file_name());
        let downloads = self.downloads.list_for_config().await?;
        if downloads.is_empty() {
            return remove_config_file(&path);
        }

        let version = next_version(&self.versions, self.name(), &path).await?;
        let doc = DownloadsDoc {
            version,
            downloads: downloads.iter().map(DownloadEntry::from).collect(),
        };
        write_config_file(&path, &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_parses_minimal() {
        let doc: DownloadsDoc = serde_yaml::from_str(
            "version: 1\ndownloads:\n  - url: https://example.com/feed\n    downloader: archive\n",
        )
        .unwrap();
        assert_eq!(doc.downloads.len(), 1);
        let entry = &doc.downloads[0];
        assert_eq!(entry.url, "https://example.com/feed");
        assert_eq!(entry.frequency_seconds, None);
        assert!(entry.settings.is_null());
        assert!(entry.tag_names.is_empty());
    }

    #[test]
    fn entry_maps_from_download_row() {
        use arca_core::models::{Download, DownloadStatus};
        use chrono::Utc;
        use uuid::Uuid;

        let download = Download {
            id: Uuid::new_v4(),
            url: "https://example.com/feed".to_string(),
            domain: Some("example.com".to_string()),
            downloader: "archive".to_string(),
            sub_downloader: None,
            destination: Some("/m/archive/example.com".to_string()),
            frequency_seconds: Some(604800),
            status: DownloadStatus::Deferred,
            location: None,
            error: None,
            attempts: 1,
            last_successful_download: None,
            next_download: Some(Utc::now()),
            settings: serde_json::json!({"depth": 1}),
            tag_names: vec!["news".to_string()],
            collection_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let entry = DownloadEntry::from(&download);
        assert_eq!(entry.url, download.url);
        assert_eq!(entry.frequency_seconds, Some(604800));
        assert_eq!(entry.tag_names, vec!["news"]);
        assert_eq!(entry.settings["depth"], 1);
        // Row bookkeeping (status, attempts) never reaches the config file.
        let dumped = serde_yaml::to_string(&entry).unwrap();
        assert!(!dumped.contains("attempts"));
        assert!(!dumped.contains("deferred"));
    }

    #[test]
    fn entry_round_trips_recurring() {
        let doc: DownloadsDoc = serde_yaml::from_str(
            r#"
version: 4
downloads:
  - url: https://youtube.com/@channel
    downloader: video
    sub_downloader: video
    frequency_seconds: 86400
    tag_names: [lectures]
    settings:
      suffix: .mp4
"#,
        )
        .unwrap();
        let entry = &doc.downloads[0];
        assert_eq!(entry.frequency_seconds, Some(86400));
        assert_eq!(entry.sub_downloader.as_deref(), Some("video"));
        assert_eq!(entry.settings["suffix"], ".mp4");

        let dumped = serde_yaml::to_string(&doc).unwrap();
        assert!(dumped.contains("frequency_seconds: 86400"));
    }
}
