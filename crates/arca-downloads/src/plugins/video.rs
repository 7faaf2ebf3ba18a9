//! Video downloader
//!
//! Drives the external video acquirer service. A download with a
//! `sub_downloader` is treated as a channel feed: the service lists the
//! feed's entries and each becomes a child download. A plain video download
//! asks the service to fetch one video into the destination directory, then
//! refreshes it so the video modeler runs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use arca_core::models::Download;
use arca_core::{DownloadError, DownloadResultExt};

use crate::downloader::{DownloadContext, DownloadResult, Downloader, KillToken};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Hosts this downloader claims without being selected explicitly.
const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "youtu.be",
    "vimeo.com",
    "www.vimeo.com",
];

#[derive(Debug, Deserialize)]
struct FeedResponse {
    entries: Vec<String>,
}

pub struct VideoDownloader {
    client: reqwest::Client,
}

impl VideoDownloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }

    async fn destination_for(
        &self,
        download: &Download,
        context: &DownloadContext,
    ) -> Result<PathBuf, DownloadError> {
        if let Some(destination) = &download.destination {
            return Ok(PathBuf::from(destination));
        }
        if let Some(collection_id) = download.collection_id {
            if let Some(collection) = context.collections.get(collection_id).await.recoverable()? {
                if let Some(directory) = collection.directory {
                    return Ok(PathBuf::from(directory));
                }
            }
        }
        Ok(context.config.videos_directory())
    }
}

impl Default for VideoDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for VideoDownloader {
    fn name(&self) -> &'static str {
        "video"
    }

    fn priority(&self) -> u8 {
        50
    }

    fn valid_url(&self, url: &str) -> bool {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|host| VIDEO_HOSTS.contains(&host.as_str()))
            .unwrap_or(false)
    }

    async fn do_download(
        &self,
        download: &Download,
        context: &DownloadContext,
        kill: &KillToken,
    ) -> Result<DownloadResult, DownloadError> {
        // A feed download only lists entries; children do the real work.
        if download.sub_downloader.is_some() {
            let response = self
                .client
                .post(format!("{}/feed", context.config.video_service_url))
                .json(&serde_json::json!({"url": download.url}))
                .send()
                .await
                .recoverable()?
                .error_for_status()
                .recoverable()?;
            let feed: FeedResponse = response.json().await.recoverable()?;

            // Skip entries that already exist as videos.
            let known = context
                .videos
                .list_by_urls(&feed.entries)
                .await
                .recoverable()?;
            let known: std::collections::HashSet<String> =
                known.into_iter().filter_map(|v| v.url).collect();
            let children: Vec<String> = feed
                .entries
                .into_iter()
                .filter(|u| !known.contains(u))
                .collect();

            return Ok(DownloadResult::success(None).with_children(children));
        }

        if let Some(existing) = context
            .videos
            .list_by_urls(std::slice::from_ref(&download.url))
            .await
            .recoverable()?
            .into_iter()
            .next()
        {
            return Ok(DownloadResult::success(Some(format!(
                "/videos/video/{}",
                existing.id
            ))));
        }

        let destination = self.destination_for(download, context).await?;
        tokio::fs::create_dir_all(&destination).await.recoverable()?;

        if kill.is_killed() {
            return Err(DownloadError::recoverable(anyhow!("Download was killed")));
        }

        // The acquirer writes the video, poster, caption and info JSON into
        // the destination itself; the response body is advisory.
        self.client
            .post(format!("{}/video", context.config.video_service_url))
            .json(&serde_json::json!({
                "url": download.url,
                "destination": destination.to_string_lossy(),
                "settings": download.settings,
            }))
            .send()
            .await
            .recoverable()?
            .error_for_status()
            .map_err(|e| {
                if e.status().map(|s| s.is_client_error()).unwrap_or(false) {
                    DownloadError::unrecoverable(e)
                } else {
                    DownloadError::recoverable(e)
                }
            })?;

        if kill.is_killed() {
            return Err(DownloadError::recoverable(anyhow!("Download was killed")));
        }

        if let Err(e) = context.refresher.refresh(vec![destination]).await {
            tracing::error!(error = %e, "Refresh after video download failed");
        }

        let location = context
            .videos
            .list_by_urls(std::slice::from_ref(&download.url))
            .await
            .recoverable()?
            .into_iter()
            .next()
            .map(|video| format!("/videos/video/{}", video.id));

        Ok(DownloadResult::success(location))
    }

    async fn already_downloaded(
        &self,
        urls: &[String],
        context: &DownloadContext,
    ) -> Result<Vec<String>> {
        let videos = context.videos.list_by_urls(urls).await?;
        Ok(videos.into_iter().filter_map(|v| v.url).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_known_video_hosts() {
        let downloader = VideoDownloader::new();
        assert!(downloader.valid_url("https://youtube.com/watch?v=abc"));
        assert!(downloader.valid_url("https://www.youtube.com/watch?v=abc"));
        assert!(downloader.valid_url("https://youtu.be/abc"));
        assert!(!downloader.valid_url("https://example.com/video.mp4"));
        assert!(!downloader.valid_url("garbage"));
    }
}
