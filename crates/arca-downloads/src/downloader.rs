//! Downloader plugin contract
//!
//! A downloader claims URLs via `valid_url` and performs the acquisition in
//! `do_download`. Plugins must check the kill token at least once per
//! expensive step and discard partial artifacts when killed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use arca_core::models::Download;
use arca_core::{AppConfig, DownloadError, EventBus};
use arca_db::{ArchiveRepository, ChannelRepository, CollectionRepository, VideoRepository};
use arca_files::Refresher;

/// Outcome of one download attempt.
#[derive(Debug, Default, Clone)]
pub struct DownloadResult {
    pub success: bool,
    /// Where the completed content can be viewed (e.g. `/archive/<id>`).
    pub location: Option<String>,
    pub error: Option<String>,
    /// Child URLs to enqueue, handled by the download's `sub_downloader`.
    pub downloads: Vec<String>,
}

impl DownloadResult {
    pub fn success(location: Option<String>) -> Self {
        Self {
            success: true,
            location,
            ..Default::default()
        }
    }

    pub fn with_children(mut self, downloads: Vec<String>) -> Self {
        self.downloads = downloads;
        self
    }
}

/// Everything a plugin may need while downloading: configuration, event
/// emission, the refresh pipeline for newly written files, and entity
/// repositories for dedupe lookups.
#[derive(Clone)]
pub struct DownloadContext {
    pub config: AppConfig,
    pub events: EventBus,
    pub refresher: Refresher,
    pub archives: ArchiveRepository,
    pub videos: VideoRepository,
    pub collections: CollectionRepository,
    pub channels: ChannelRepository,
}

/// Cooperative cancellation handle for one in-flight download.
#[derive(Clone)]
pub struct KillToken {
    killed: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl KillToken {
    pub fn new(killed: Arc<Mutex<HashSet<Uuid>>>, id: Uuid) -> Self {
        Self { killed, id }
    }

    /// Whether this download was killed. Checked at suspension points.
    pub fn is_killed(&self) -> bool {
        self.killed
            .lock()
            .expect("kill set lock poisoned")
            .contains(&self.id)
    }
}

#[async_trait]
pub trait Downloader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Registry rank; lower runs first. The archive downloader claims
    /// anything and carries the highest value, making it the catch-all.
    fn priority(&self) -> u8;

    /// Whether this downloader handles `url`.
    fn valid_url(&self, url: &str) -> bool;

    async fn do_download(
        &self,
        download: &Download,
        context: &DownloadContext,
        kill: &KillToken,
    ) -> Result<DownloadResult, DownloadError>;

    /// The subset of `urls` already covered by existing typed entities.
    async fn already_downloaded(
        &self,
        urls: &[String],
        context: &DownloadContext,
    ) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_result_carries_location() {
        let result = DownloadResult::success(Some("/archive/abc".to_string()));
        assert!(result.success);
        assert_eq!(result.location.as_deref(), Some("/archive/abc"));
        assert!(result.downloads.is_empty());
    }

    #[test]
    fn feed_result_carries_children() {
        let result = DownloadResult::success(None)
            .with_children(vec!["https://example.com/1.pdf".to_string()]);
        assert!(result.success);
        assert_eq!(result.downloads.len(), 1);
    }

    #[test]
    fn kill_token_reflects_shared_set() {
        let killed = Arc::new(Mutex::new(HashSet::new()));
        let id = Uuid::new_v4();
        let token = KillToken::new(killed.clone(), id);
        assert!(!token.is_killed());

        killed.lock().unwrap().insert(id);
        assert!(token.is_killed());

        killed.lock().unwrap().remove(&id);
        assert!(!token.is_killed());
    }
}
