//! Download manager: worker pool, LISTEN/NOTIFY or polling, retry,
//! kill and per-domain throttling.
//!
//! Shutdown: [`DownloadManager::shutdown`] signals the pool to stop; it does
//! not wait for in-flight downloads. The `downloads_stopped` flag is also
//! honored between claims for config-driven drain.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use arca_core::models::{retry_backoff_seconds, Download, DownloadStatus};
use arca_core::{AppError, EventBus, RuntimeFlags};
use arca_db::download::DOWNLOAD_NOTIFY_CHANNEL;
use arca_db::DownloadRepository;

use crate::downloader::{DownloadContext, DownloadResult, KillToken};
use crate::registry::DownloaderRegistry;

#[derive(Clone)]
pub struct DownloadManagerConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub download_timeout_seconds: u64,
    /// Manager-level retry ceiling; plugins may fail unrecoverably sooner.
    pub max_attempts: i32,
}

impl Default for DownloadManagerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            download_timeout_seconds: 600,
            max_attempts: 3,
        }
    }
}

#[derive(Clone)]
pub struct DownloadManager {
    repository: DownloadRepository,
    registry: Arc<DownloaderRegistry>,
    context: Arc<DownloadContext>,
    flags: RuntimeFlags,
    events: EventBus,
    config: DownloadManagerConfig,
    killed: Arc<Mutex<HashSet<Uuid>>>,
    processing_domains: Arc<Mutex<HashSet<String>>>,
    shutdown_tx: mpsc::Sender<()>,
}

impl DownloadManager {
    /// Create the manager and spawn its worker pool.
    ///
    /// When `pool` is `Some`, workers wake on `pg_notify` as downloads are
    /// created, in addition to polling at `poll_interval_ms`.
    pub fn new(
        repository: DownloadRepository,
        registry: Arc<DownloaderRegistry>,
        context: Arc<DownloadContext>,
        flags: RuntimeFlags,
        events: EventBus,
        config: DownloadManagerConfig,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let manager = Self {
            repository,
            registry,
            context,
            flags,
            events,
            config,
            killed: Arc::new(Mutex::new(HashSet::new())),
            processing_domains: Arc::new(Mutex::new(HashSet::new())),
            shutdown_tx,
        };

        let worker = manager.clone();
        tokio::spawn(async move {
            worker.worker_pool(shutdown_rx, pool).await;
        });

        manager
    }

    /// Create a manager without a worker pool. Submitted downloads are
    /// written to the DB and picked up once a real manager runs.
    pub fn new_no_worker(
        repository: DownloadRepository,
        registry: Arc<DownloaderRegistry>,
        context: Arc<DownloadContext>,
        flags: RuntimeFlags,
        events: EventBus,
        config: DownloadManagerConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(shutdown_rx);
        Self {
            repository,
            registry,
            context,
            flags,
            events,
            config,
            killed: Arc::new(Mutex::new(HashSet::new())),
            processing_domains: Arc::new(Mutex::new(HashSet::new())),
            shutdown_tx,
        }
    }

    /// Create a download. Idempotent: an existing non-terminal row for the
    /// URL is returned unchanged. Fails with `InvalidDownload` when no
    /// downloader accepts the URL.
    #[tracing::instrument(skip(self, settings, tag_names))]
    #[allow(clippy::too_many_arguments)]
    pub async fn create_download(
        &self,
        url: &str,
        downloader_name: Option<&str>,
        frequency_seconds: Option<i64>,
        destination: Option<&str>,
        tag_names: &[String],
        settings: Option<Value>,
        collection_id: Option<Uuid>,
    ) -> Result<Download, AppError> {
        if Download::domain_of(url).is_none() {
            return Err(AppError::InvalidDownload(format!("Invalid URL: {}", url)));
        }

        let downloader = match downloader_name {
            Some(name) => self.registry.get_by_name(name).ok_or_else(|| {
                AppError::InvalidDownload(format!("Unknown downloader: {}", name))
            })?,
            None => self.registry.find_for_url(url).ok_or_else(|| {
                AppError::InvalidDownload(format!("No downloader accepts URL: {}", url))
            })?,
        };

        let sub_downloader = settings
            .as_ref()
            .and_then(|s| s.get("sub_downloader"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let download = self
            .repository
            .create(
                url,
                downloader.name(),
                sub_downloader.as_deref(),
                destination,
                frequency_seconds,
                settings.unwrap_or_else(|| Value::Object(Default::default())),
                tag_names,
                collection_id,
            )
            .await?;

        tracing::info!(
            download_id = %download.id,
            url = %download.url,
            downloader = %download.downloader,
            "Download submitted"
        );
        Ok(download)
    }

    /// Same as `create_download` but requires a frequency.
    #[allow(clippy::too_many_arguments)]
    pub async fn recurring_download(
        &self,
        url: &str,
        downloader_name: Option<&str>,
        frequency_seconds: i64,
        destination: Option<&str>,
        tag_names: &[String],
        settings: Option<Value>,
        collection_id: Option<Uuid>,
    ) -> Result<Download, AppError> {
        if frequency_seconds <= 0 {
            return Err(AppError::Validation(
                "Recurring download frequency must be positive".to_string(),
            ));
        }
        self.create_download(
            url,
            downloader_name,
            Some(frequency_seconds),
            destination,
            tag_names,
            settings,
            collection_id,
        )
        .await
    }

    /// URLs already covered by existing entities, per plugin.
    pub async fn already_downloaded(&self, urls: &[String]) -> Result<Vec<String>, AppError> {
        let found = self
            .registry
            .already_downloaded(urls, &self.context)
            .await
            .context("already_downloaded check failed")?;
        Ok(found)
    }

    /// Kill a download. In-flight workers poll the kill set at suspension
    /// points and abort, discarding partial artifacts; queued rows are
    /// failed directly.
    pub async fn kill(&self, id: Uuid) -> Result<(), AppError> {
        let download = self.repository.find(id).await?;
        match download.status {
            DownloadStatus::Pending => {
                self.killed
                    .lock()
                    .expect("kill set lock poisoned")
                    .insert(id);
                tracing::info!(download_id = %id, "Download marked killed");
            }
            DownloadStatus::New | DownloadStatus::Deferred => {
                self.repository.mark_failed(id, "Download was killed").await?;
            }
            DownloadStatus::Complete | DownloadStatus::Failed => {
                return Err(AppError::Conflict(format!(
                    "Download {} already finished",
                    id
                )));
            }
        }
        Ok(())
    }

    pub async fn restart(&self, id: Uuid) -> Result<Download, AppError> {
        self.killed
            .lock()
            .expect("kill set lock poisoned")
            .remove(&id);
        self.repository.restart(id).await
    }

    pub async fn retry_failed(&self) -> Result<u64, AppError> {
        self.repository.retry_failed().await
    }

    pub async fn delete(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        self.repository.delete_ids(ids).await
    }

    /// Complete failed/deferred downloads of `url` after the content arrived
    /// out of band (e.g. a SingleFile upload).
    pub async fn complete_for_upload(&self, url: &str, location: &str) -> Result<u64, AppError> {
        self.repository.complete_for_url(url, location).await
    }

    /// Pull the next eligible download, transitioning it to `pending`.
    /// Honors the disabled flag and the per-domain throttle; returns `None`
    /// when nothing is runnable.
    pub async fn get_new_download(&self) -> Result<Option<Download>, AppError> {
        if self.flags.downloads_disabled() || self.flags.downloads_stopped() {
            return Ok(None);
        }
        let excluded: Vec<String> = self
            .processing_domains
            .lock()
            .expect("processing domains lock poisoned")
            .iter()
            .cloned()
            .collect();
        self.repository.claim_next(&excluded).await
    }

    /// Signal the worker pool to exit. Does not wait for in-flight work.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating download manager shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }

    async fn worker_pool(&self, mut shutdown_rx: mpsc::Receiver<()>, pool: Option<sqlx::PgPool>) {
        let use_listen = pool.is_some();
        tracing::info!(
            max_workers = self.config.max_workers,
            poll_interval_ms = self.config.poll_interval_ms,
            listen_notify = use_listen,
            "Download worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        // Channel to wake the main loop when LISTEN receives a NOTIFY.
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
        if let Some(pool) = pool {
            let tx = notify_tx.clone();
            tokio::spawn(async move {
                loop {
                    match sqlx::postgres::PgListener::connect_with(&pool).await {
                        Ok(mut listener) => {
                            if let Err(e) = listener.listen(DOWNLOAD_NOTIFY_CHANNEL).await {
                                tracing::warn!(error = %e, "LISTEN failed, will retry");
                                tokio::time::sleep(Duration::from_secs(5)).await;
                                continue;
                            }
                            while listener.recv().await.is_ok() {
                                let _ = tx.send(()).await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "PgListener connect failed, will retry");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Download worker pool shutting down");
                    break;
                }
                _ = notify_rx.recv() => {
                    self.claim_and_dispatch_one(&semaphore).await;
                }
                _ = sleep(poll_interval) => {
                    self.claim_and_dispatch_one(&semaphore).await;
                }
            }
        }

        tracing::info!("Download worker pool stopped");
    }

    async fn claim_and_dispatch_one(&self, semaphore: &Arc<Semaphore>) {
        if self.flags.downloads_stopped() || self.flags.downloads_disabled() {
            tracing::trace!("Downloads disabled or stopped, skipping claim");
            return;
        }

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("No workers available, skipping claim");
                return;
            }
        };

        // Per-domain throttle: skip candidates whose host is in flight.
        let excluded: Vec<String> = self
            .processing_domains
            .lock()
            .expect("processing domains lock poisoned")
            .iter()
            .cloned()
            .collect();

        match self.repository.claim_next(&excluded).await {
            Ok(Some(download)) => {
                if let Some(domain) = download.domain.clone() {
                    self.processing_domains
                        .lock()
                        .expect("processing domains lock poisoned")
                        .insert(domain);
                }
                let manager = self.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let domain = download.domain.clone();
                    if let Err(e) = manager.process_download(download).await {
                        tracing::error!(error = %e, "Download processing failed");
                    }
                    if let Some(domain) = domain {
                        manager
                            .processing_domains
                            .lock()
                            .expect("processing domains lock poisoned")
                            .remove(&domain);
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No downloads eligible");
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Failed to claim download");
            }
        }
    }

    #[tracing::instrument(skip(self, download), fields(download.id = %download.id, download.url = %download.url))]
    async fn process_download(&self, download: Download) -> Result<(), AppError> {
        let downloader = match self.registry.get_by_name(&download.downloader) {
            Some(downloader) => downloader,
            None => {
                let error = format!("Unknown downloader: {}", download.downloader);
                self.repository.mark_failed(download.id, &error).await?;
                return Err(AppError::InvalidDownload(error));
            }
        };

        let kill = KillToken::new(self.killed.clone(), download.id);
        let timeout = Duration::from_secs(self.config.download_timeout_seconds);
        let result = tokio::time::timeout(
            timeout,
            downloader.do_download(&download, &self.context, &kill),
        )
        .await;

        // A killed download is failed and its partial artifacts are
        // discarded by the plugin; no FileGroup is inserted.
        if self.take_killed(download.id) {
            tracing::info!(download_id = %download.id, "Download was killed mid-flight");
            self.repository
                .mark_failed(download.id, "Download was killed")
                .await?;
            return Ok(());
        }

        match result {
            Ok(Ok(result)) if result.success => self.finish_success(&download, result).await,
            Ok(Ok(result)) => {
                let error = result
                    .error
                    .unwrap_or_else(|| "Downloader reported failure".to_string());
                self.handle_failure(&download, true, &error).await
            }
            Ok(Err(e)) => {
                let recoverable = e.is_recoverable();
                self.handle_failure(&download, recoverable, &e.to_string())
                    .await
            }
            Err(_) => {
                tracing::error!(
                    download_id = %download.id,
                    timeout_seconds = self.config.download_timeout_seconds,
                    "Download timed out"
                );
                self.handle_failure(&download, true, "Download timed out")
                    .await
            }
        }
    }

    async fn finish_success(
        &self,
        download: &Download,
        result: DownloadResult,
    ) -> Result<(), AppError> {
        self.repository
            .mark_complete(download.id, result.location.as_deref())
            .await?;
        tracing::info!(
            download_id = %download.id,
            url = %download.url,
            location = ?result.location,
            "Download completed"
        );

        // Feed downloads return children handled by the sub downloader;
        // without one, the registry picks by URL as usual.
        let child_downloader = download.sub_downloader.as_deref();
        for child_url in result.downloads {
            if let Err(e) = self
                .create_download(
                    &child_url,
                    child_downloader,
                    None,
                    download.destination.as_deref(),
                    &download.tag_names,
                    Some(download.settings.clone()),
                    download.collection_id,
                )
                .await
            {
                tracing::error!(url = %child_url, error = %e, "Cannot enqueue child download");
            }
        }
        Ok(())
    }

    async fn handle_failure(
        &self,
        download: &Download,
        recoverable: bool,
        error: &str,
    ) -> Result<(), AppError> {
        let attempts = download.attempts + 1;
        if recoverable && attempts < self.config.max_attempts {
            let backoff = retry_backoff_seconds(attempts);
            let next_download = Utc::now() + ChronoDuration::seconds(backoff as i64);
            tracing::info!(
                download_id = %download.id,
                attempts,
                backoff_seconds = backoff,
                "Deferring download for retry"
            );
            self.repository
                .defer(download.id, next_download, error)
                .await?;
        } else {
            tracing::error!(
                download_id = %download.id,
                url = %download.url,
                attempts,
                recoverable,
                "Download failed permanently"
            );
            self.repository.mark_failed(download.id, error).await?;
            self.events.send_download_failed(&download.url, error);
        }
        Ok(())
    }

    /// Remove the id from the kill set, reporting whether it was present.
    fn take_killed(&self, id: Uuid) -> bool {
        self.killed
            .lock()
            .expect("kill set lock poisoned")
            .remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = DownloadManagerConfig::default();
        assert_eq!(config.max_workers, 4);
        assert!(config.max_attempts > 0);
        assert!(config.download_timeout_seconds > 0);
    }
}
