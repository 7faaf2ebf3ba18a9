//! Archive downloader
//!
//! Posts a URL to the SingleFile acquirer service, writes the returned
//! snapshot and readability variants under the domain directory, then lets
//! the refresh pipeline model them into an Archive.
//!
//! This downloader claims every URL, so it registers with the highest
//! priority value and acts as the catch-all fallback.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use arca_core::models::{CollectionKind, Download};
use arca_core::{DownloadError, DownloadResultExt};

use crate::downloader::{DownloadContext, DownloadResult, Downloader, KillToken};

/// Archive acquisitions give up after this many attempts.
const MAX_ATTEMPTS: i32 = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct ArchiveServiceResponse {
    singlefile: String,
    readability: Option<String>,
    readability_txt: Option<String>,
    readability_json: Option<serde_json::Value>,
}

pub struct ArchiveDownloader {
    client: reqwest::Client,
}

impl ArchiveDownloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for ArchiveDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for ArchiveDownloader {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn priority(&self) -> u8 {
        // The archiver will attempt anything, so it must be last.
        100
    }

    fn valid_url(&self, url: &str) -> bool {
        url::Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    async fn do_download(
        &self,
        download: &Download,
        context: &DownloadContext,
        kill: &KillToken,
    ) -> Result<DownloadResult, DownloadError> {
        if download.attempts > MAX_ATTEMPTS {
            return Err(DownloadError::unrecoverable(anyhow!(
                "Max download attempts reached for {}",
                download.url
            )));
        }

        // An already-archived URL resolves to the existing Archive; no
        // duplicate files are written.
        if let Some(existing) = context
            .archives
            .latest_by_url(&download.url)
            .await
            .recoverable()?
        {
            return Ok(DownloadResult::success(Some(format!(
                "/archive/{}",
                existing.id
            ))));
        }

        let response = self
            .client
            .post(format!("{}/json", context.config.archive_service_url))
            .json(&serde_json::json!({"url": download.url}))
            .send()
            .await
            .recoverable()?
            .error_for_status()
            .recoverable()?;
        let payload: ArchiveServiceResponse = response.json().await.recoverable()?;

        if kill.is_killed() {
            return Err(DownloadError::recoverable(anyhow!("Download was killed")));
        }

        let domain = Download::domain_of(&download.url)
            .ok_or_else(|| DownloadError::unrecoverable(anyhow!("URL has no hostname")))?;

        let directory = match &download.destination {
            Some(destination) => PathBuf::from(destination),
            None => context.config.archive_directory().join(&domain),
        };

        // The file layout inside the domain directory follows the
        // collection's file format when one is set.
        let file_format = context
            .collections
            .get_by_name(&domain, CollectionKind::Domain)
            .await
            .recoverable()?
            .and_then(|c| c.file_format)
            .unwrap_or_else(|| context.config.archive_file_format.clone());

        let title = title_for_filename(&download.url);
        let now = Utc::now();
        let mut written: Vec<PathBuf> = Vec::new();

        let write_variant = |ext: &str, contents: Option<String>| -> Vec<(PathBuf, String)> {
            match contents {
                Some(contents) => {
                    let relative = format_archive_path(&file_format, now, &title, ext);
                    vec![(directory.join(relative), contents)]
                }
                None => Vec::new(),
            }
        };

        let mut pending: Vec<(PathBuf, String)> = Vec::new();
        pending.extend(write_variant("html", Some(payload.singlefile)));
        pending.extend(write_variant("readability.html", payload.readability));
        pending.extend(write_variant("readability.txt", payload.readability_txt));
        pending.extend(write_variant(
            "readability.json",
            payload
                .readability_json
                .map(|v| serde_json::to_string(&v).unwrap_or_default()),
        ));

        for (path, contents) in &pending {
            if kill.is_killed() {
                discard(&written).await;
                return Err(DownloadError::recoverable(anyhow!("Download was killed")));
            }
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.recoverable()?;
            }
            tokio::fs::write(path, contents).await.recoverable()?;
            written.push(path.clone());
        }

        // Let the refresh pipeline model what was written. A refresh already
        // in progress will pick the files up on its own.
        if let Err(e) = context.refresher.refresh(vec![directory.clone()]).await {
            tracing::error!(error = %e, "Refresh after archive download failed");
        }

        let location = context
            .archives
            .latest_by_url(&download.url)
            .await
            .recoverable()?
            .map(|archive| format!("/archive/{}", archive.id));

        Ok(DownloadResult::success(location))
    }

    async fn already_downloaded(
        &self,
        urls: &[String],
        context: &DownloadContext,
    ) -> Result<Vec<String>> {
        let archives = context.archives.list_by_urls(urls).await?;
        Ok(archives.into_iter().filter_map(|a| a.url).collect())
    }
}

async fn discard(written: &[PathBuf]) {
    for path in written {
        let _ = tokio::fs::remove_file(path).await;
    }
}

/// A filesystem-safe title derived from the URL path.
fn title_for_filename(url: &str) -> String {
    let title = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "index".to_string());
    title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// Expand an archive file format string. Supported tokens:
/// `%(download_year)s`, `%(download_datetime)s`, `%(title)s`, `%(ext)s`.
/// The result may contain `/` to place files in subfolders.
pub fn format_archive_path(format: &str, now: DateTime<Utc>, title: &str, ext: &str) -> String {
    format
        .replace("%(download_year)s", &now.format("%Y").to_string())
        .replace(
            "%(download_datetime)s",
            &now.format("%Y-%m-%d-%H%M%S").to_string(),
        )
        .replace("%(title)s", title)
        .replace("%(ext)s", ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_flat_layout() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            format_archive_path("%(download_datetime)s_%(title)s.%(ext)s", now, "Page", "html"),
            "2026-03-04-050607_Page.html"
        );
    }

    #[test]
    fn formats_year_subfolder_layout() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            format_archive_path(
                "%(download_year)s/%(download_datetime)s_%(title)s.%(ext)s",
                now,
                "Page",
                "readability.html"
            ),
            "2026/2026-03-04-050607_Page.readability.html"
        );
    }

    #[test]
    fn filename_title_is_sanitized() {
        assert_eq!(
            title_for_filename("https://example.com/some/Article-Name?x=1"),
            "Article-Name"
        );
        assert_eq!(
            title_for_filename("https://example.com/a/b/page%3Fx.html"),
            "page_3Fx.html"
        );
        assert_eq!(title_for_filename("https://example.com/"), "index");
        assert_eq!(title_for_filename("https://example.com"), "index");
    }

    #[test]
    fn archiver_claims_http_only() {
        let downloader = ArchiveDownloader::new();
        assert!(downloader.valid_url("https://example.com/a"));
        assert!(downloader.valid_url("http://example.com/a"));
        assert!(!downloader.valid_url("ftp://example.com/a"));
        assert!(!downloader.valid_url("not a url"));
    }
}
