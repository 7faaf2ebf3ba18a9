//! Video modeler
//!
//! Promotes a video FileGroup into a Video. The acquirer's info JSON,
//! poster and caption sidecars become data-bag entries; the video is
//! attached to its channel by walking up from the file's directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use arca_core::models::{data_keys, FileGroup};
use arca_core::AppConfig;
use arca_db::{ChannelRepository, VideoRepository};

use crate::modeler::Modeler;
use crate::stems::suffix_of;

/// The subset of the acquirer's info JSON the modeler reads.
#[derive(Debug, Default, Deserialize)]
struct InfoJson {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    webpage_url: Option<String>,
    upload_date: Option<String>,
    duration: Option<f64>,
    view_count: Option<i64>,
}

pub struct VideoModeler {
    config: AppConfig,
    videos: VideoRepository,
    channels: ChannelRepository,
}

impl VideoModeler {
    pub fn new(config: AppConfig, videos: VideoRepository, channels: ChannelRepository) -> Self {
        Self {
            config,
            videos,
            channels,
        }
    }

    /// Find the channel owning `directory` by walking up toward the videos
    /// root. Files may sit in subdirectories of the channel directory.
    async fn channel_for_directory(&self, directory: &Path) -> Result<Option<uuid::Uuid>> {
        let videos_root = self.config.videos_directory();
        let mut candidate: Option<PathBuf> = Some(directory.to_path_buf());
        while let Some(current) = candidate {
            if !current.starts_with(&videos_root) || current == videos_root {
                break;
            }
            if let Some(channel) = self
                .channels
                .get_by_directory(&current.to_string_lossy())
                .await?
            {
                return Ok(Some(channel.id));
            }
            candidate = current.parent().map(Path::to_path_buf);
        }
        Ok(None)
    }
}

#[async_trait]
impl Modeler for VideoModeler {
    fn name(&self) -> &'static str {
        "video"
    }

    fn mimetype_prefix(&self) -> &'static str {
        "video/"
    }

    async fn model(&self, file_group: &mut FileGroup) -> Result<bool> {
        let directory = Path::new(&file_group.directory).to_path_buf();

        let mut info_json_name: Option<String> = None;
        let mut poster: Option<String> = None;
        let mut caption: Option<String> = None;
        for name in &file_group.files {
            let suffix = suffix_of(name).to_ascii_lowercase();
            if suffix == "info.json" {
                info_json_name = Some(name.clone());
            } else if matches!(suffix.as_str(), "png" | "jpg" | "jpeg" | "webp") {
                poster = Some(name.clone());
            } else if suffix.ends_with("vtt") || suffix.ends_with("srt") {
                caption = Some(name.clone());
            }
        }

        let info: InfoJson = match &info_json_name {
            Some(name) => {
                let path = directory.join(name);
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Cannot read {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Invalid info JSON {}", path.display()))?
            }
            None => InfoJson::default(),
        };

        let channel_id = self.channel_for_directory(&directory).await?;
        let upload_date = info.upload_date.as_deref().and_then(parse_upload_date);

        let video = self.videos.find_or_create(file_group.id).await?;
        self.videos
            .update(
                video.id,
                channel_id,
                info.id.as_deref(),
                upload_date,
                info.duration.map(|d| d.round() as i32),
                info.view_count,
                info.webpage_url.as_deref(),
            )
            .await?;

        if let Some(name) = info_json_name {
            file_group.data.insert(data_keys::INFO_JSON.into(), name);
        }
        if let Some(name) = poster {
            file_group.data.insert(data_keys::POSTER.into(), name);
        }
        if let Some(name) = caption {
            file_group.data.insert(data_keys::CAPTION.into(), name);
        }

        let title = info.title.or_else(|| file_group.title.clone());
        file_group.url = info.webpage_url;
        file_group.title = title.clone();
        file_group.published_datetime = upload_date;
        file_group.a_text = title;
        file_group.d_text = info.description;

        Ok(true)
    }
}

/// Upload dates arrive as `YYYYMMDD`.
fn parse_upload_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn upload_date_parses_compact_format() {
        assert_eq!(
            parse_upload_date("20260115"),
            Some(Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_upload_date("2026-01-15"), None);
        assert_eq!(parse_upload_date("garbage"), None);
    }

    #[test]
    fn info_json_tolerates_unknown_fields() {
        let info: InfoJson = serde_json::from_str(
            r#"{"id": "abc123", "title": "T", "duration": 12.7, "formats": [{"x": 1}]}"#,
        )
        .unwrap();
        assert_eq!(info.id.as_deref(), Some("abc123"));
        assert_eq!(info.duration, Some(12.7));
        assert_eq!(info.view_count, None);
    }
}
