//! Downloader registry
//!
//! Downloaders are ordered by priority; the first one that claims a URL via
//! `valid_url` handles it.

use std::sync::Arc;

use anyhow::Result;

use crate::downloader::{DownloadContext, Downloader};

#[derive(Default)]
pub struct DownloaderRegistry {
    downloaders: Vec<Arc<dyn Downloader>>,
}

impl DownloaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a downloader, keeping the list sorted by priority.
    pub fn register(&mut self, downloader: Arc<dyn Downloader>) {
        self.downloaders.push(downloader);
        self.downloaders.sort_by_key(|d| d.priority());
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Downloader>> {
        self.downloaders.iter().find(|d| d.name() == name).cloned()
    }

    /// The first downloader claiming `url`, in priority order.
    pub fn find_for_url(&self, url: &str) -> Option<Arc<dyn Downloader>> {
        self.downloaders.iter().find(|d| d.valid_url(url)).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.downloaders.iter().map(|d| d.name()).collect()
    }

    /// URLs already covered by any plugin's existing entities.
    pub async fn already_downloaded(
        &self,
        urls: &[String],
        context: &DownloadContext,
    ) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for downloader in &self.downloaders {
            let mut hits = downloader.already_downloaded(urls, context).await?;
            found.append(&mut hits);
        }
        found.sort();
        found.dedup();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::{DownloadResult, KillToken};
    use arca_core::models::Download;
    use arca_core::DownloadError;
    use async_trait::async_trait;

    struct StubDownloader {
        name: &'static str,
        priority: u8,
        claims: &'static str,
    }

    #[async_trait]
    impl Downloader for StubDownloader {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn valid_url(&self, url: &str) -> bool {
            self.claims == "*" || url.contains(self.claims)
        }

        async fn do_download(
            &self,
            _download: &Download,
            _context: &DownloadContext,
            _kill: &KillToken,
        ) -> Result<DownloadResult, DownloadError> {
            Ok(DownloadResult::success(None))
        }

        async fn already_downloaded(
            &self,
            _urls: &[String],
            _context: &DownloadContext,
        ) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn registry() -> DownloaderRegistry {
        let mut registry = DownloaderRegistry::new();
        // Registered out of order; priority decides.
        registry.register(Arc::new(StubDownloader {
            name: "archive",
            priority: 100,
            claims: "*",
        }));
        registry.register(Arc::new(StubDownloader {
            name: "video",
            priority: 50,
            claims: "youtube.com",
        }));
        registry
    }

    #[test]
    fn first_claimer_by_priority_wins() {
        let registry = registry();
        assert_eq!(
            registry
                .find_for_url("https://youtube.com/watch?v=x")
                .unwrap()
                .name(),
            "video"
        );
        // The archive downloader is the catch-all fallback.
        assert_eq!(
            registry
                .find_for_url("https://example.com/page")
                .unwrap()
                .name(),
            "archive"
        );
    }

    #[test]
    fn unclaimed_url_finds_nothing_without_catchall() {
        let mut registry = DownloaderRegistry::new();
        registry.register(Arc::new(StubDownloader {
            name: "video",
            priority: 50,
            claims: "youtube.com",
        }));
        assert!(registry.find_for_url("https://example.com/page").is_none());
    }

    #[test]
    fn lookup_by_name() {
        let registry = registry();
        assert!(registry.get_by_name("video").is_some());
        assert!(registry.get_by_name("nope").is_none());
        assert_eq!(registry.names(), vec!["video", "archive"]);
    }
}
