//! Scrape downloader
//!
//! Fetches an HTML page, extracts its links, and enqueues the matching ones
//! as child downloads. `settings.suffix` filters links by file suffix;
//! `settings.max_links` bounds the fan-out. Children are handled by the
//! download's sub-downloader (usually `file`).

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;

use arca_core::models::Download;
use arca_core::{DownloadError, DownloadResultExt};

use crate::downloader::{DownloadContext, DownloadResult, Downloader, KillToken};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_LINKS: usize = 100;

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href=["']([^"'#]+)["']"#).expect("static regex"))
}

pub struct ScrapeDownloader {
    client: reqwest::Client,
}

impl ScrapeDownloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for ScrapeDownloader {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract absolute links from `contents`, resolved against `base`,
/// filtered by `suffix` and bounded by `max_links`.
fn extract_links(
    base: &url::Url,
    contents: &str,
    suffix: Option<&str>,
    max_links: usize,
) -> Vec<String> {
    let mut links = Vec::new();
    for capture in href_regex().captures_iter(contents) {
        let Ok(resolved) = base.join(&capture[1]) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        if let Some(suffix) = suffix {
            if !resolved.path().to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
                continue;
            }
        }
        let resolved = resolved.to_string();
        if !links.contains(&resolved) {
            links.push(resolved);
        }
        if links.len() >= max_links {
            break;
        }
    }
    links
}

#[async_trait]
impl Downloader for ScrapeDownloader {
    fn name(&self) -> &'static str {
        "scrape"
    }

    fn priority(&self) -> u8 {
        90
    }

    fn valid_url(&self, _url: &str) -> bool {
        // Scraping fans out aggressively; never claim a URL implicitly.
        false
    }

    async fn do_download(
        &self,
        download: &Download,
        _context: &DownloadContext,
        kill: &KillToken,
    ) -> Result<DownloadResult, DownloadError> {
        let base = url::Url::parse(&download.url)
            .map_err(|e| DownloadError::unrecoverable(anyhow!("Invalid URL: {}", e)))?;

        let response = self
            .client
            .get(&download.url)
            .send()
            .await
            .recoverable()?
            .error_for_status()
            .recoverable()?;
        let contents = response.text().await.recoverable()?;

        if kill.is_killed() {
            return Err(DownloadError::recoverable(anyhow!("Download was killed")));
        }

        let suffix = download
            .settings
            .get("suffix")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let max_links = download
            .settings
            .get("max_links")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_LINKS);

        let children = extract_links(&base, &contents, suffix.as_deref(), max_links);
        tracing::info!(
            url = %download.url,
            links = children.len(),
            "Scrape extracted links"
        );

        Ok(DownloadResult::success(None).with_children(children))
    }

    async fn already_downloaded(
        &self,
        _urls: &[String],
        _context: &DownloadContext,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <a href="/files/a.pdf">a</a>
        <a href="https://other.org/b.pdf">b</a>
        <a href="/files/a.pdf">duplicate</a>
        <a href="/page.html">page</a>
        <a href="mailto:x@example.com">mail</a>
        <a href="#section">anchor</a>
    "##;

    #[test]
    fn resolves_and_filters_links() {
        let base = url::Url::parse("https://example.com/index.html").unwrap();
        let links = extract_links(&base, PAGE, Some(".pdf"), 100);
        assert_eq!(
            links,
            vec![
                "https://example.com/files/a.pdf".to_string(),
                "https://other.org/b.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn unfiltered_links_keep_pages_but_not_mailto() {
        let base = url::Url::parse("https://example.com/").unwrap();
        let links = extract_links(&base, PAGE, None, 100);
        assert!(links.contains(&"https://example.com/page.html".to_string()));
        assert!(!links.iter().any(|l| l.starts_with("mailto:")));
    }

    #[test]
    fn respects_max_links() {
        let base = url::Url::parse("https://example.com/").unwrap();
        let links = extract_links(&base, PAGE, None, 1);
        assert_eq!(links.len(), 1);
    }
}
