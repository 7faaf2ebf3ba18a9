//! Plain file downloader
//!
//! Fetches a single URL into the destination directory. Never claims URLs
//! on its own; it is selected explicitly or as the sub-downloader of a
//! scrape download.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use arca_core::models::Download;
use arca_core::{DownloadError, DownloadResultExt};

use crate::downloader::{DownloadContext, DownloadResult, Downloader, KillToken};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub struct FileDownloader {
    client: reqwest::Client,
}

impl FileDownloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for FileDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for FileDownloader {
    fn name(&self) -> &'static str {
        "file"
    }

    fn priority(&self) -> u8 {
        80
    }

    fn valid_url(&self, _url: &str) -> bool {
        // Explicit selection only; the archiver is the generic fallback.
        false
    }

    async fn do_download(
        &self,
        download: &Download,
        context: &DownloadContext,
        kill: &KillToken,
    ) -> Result<DownloadResult, DownloadError> {
        let destination = download
            .destination
            .as_ref()
            .map(PathBuf::from)
            .ok_or_else(|| {
                DownloadError::unrecoverable(anyhow!("File download requires a destination"))
            })?;

        let filename = filename_of(&download.url).ok_or_else(|| {
            DownloadError::unrecoverable(anyhow!("Cannot derive a filename from {}", download.url))
        })?;

        let response = self
            .client
            .get(&download.url)
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
        let bytes = response.bytes().await.recoverable()?;

        // A killed download must not leave a FileGroup behind.
        if kill.is_killed() {
            return Err(DownloadError::recoverable(anyhow!("Download was killed")));
        }

        tokio::fs::create_dir_all(&destination).await.recoverable()?;
        let path = destination.join(&filename);
        tokio::fs::write(&path, &bytes).await.recoverable()?;

        if kill.is_killed() {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(DownloadError::recoverable(anyhow!("Download was killed")));
        }

        if let Err(e) = context.refresher.refresh(vec![destination]).await {
            tracing::error!(error = %e, "Refresh after file download failed");
        }

        Ok(DownloadResult::success(None))
    }

    async fn already_downloaded(
        &self,
        _urls: &[String],
        _context: &DownloadContext,
    ) -> Result<Vec<String>> {
        // Plain files leave no typed entity to check against.
        Ok(Vec::new())
    }
}

fn filename_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_from_url() {
        assert_eq!(
            filename_of("https://example.com/docs/manual.pdf"),
            Some("manual.pdf".to_string())
        );
        assert_eq!(filename_of("https://example.com/"), None);
        assert_eq!(filename_of("garbage"), None);
    }

    #[test]
    fn never_claims_urls() {
        let downloader = FileDownloader::new();
        assert!(!downloader.valid_url("https://example.com/manual.pdf"));
    }
}
