//! Service graph construction
//!
//! Builds every repository, registry, worker and service, wires the config
//! switches, and spawns the background loops. The download flags stay set
//! until `import_configs_at_startup` releases them.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use arca_config::{
    register_config_switches, ChannelsConfig, ConfigMirror, ConfigMirrors, DomainsConfig,
    DownloadsConfig, InventoriesConfig, TagsConfig,
};
use arca_core::{AppConfig, EventBus, RuntimeFlags};
use arca_db::{
    ArchiveRepository, ChannelRepository, CollectionRepository, ConfigVersionRepository,
    DownloadRepository, FileGroupRepository, InventoryRepository, TagRepository, VideoRepository,
};
use arca_downloads::plugins::{ArchiveDownloader, FileDownloader, ScrapeDownloader, VideoDownloader};
use arca_downloads::{
    DownloadContext, DownloadManager, DownloadManagerConfig, DownloaderRegistry,
};
use arca_files::modelers::{ArchiveModeler, VideoModeler};
use arca_files::{AfterRefreshRegistry, ModelerRegistry, Refresher};
use arca_services::hooks::register_after_refresh_hooks;
use arca_services::{CollectionService, DirectoryMover};
use arca_worker::SwitchBus;

use crate::state::AppState;

pub async fn build_state(config: AppConfig, pool: PgPool) -> Result<Arc<AppState>> {
    let flags = RuntimeFlags::new();
    flags.set_wrol_mode(config.is_wrol_mode());
    let events = EventBus::new();
    let switches = SwitchBus::new();

    // Repositories
    let tags = TagRepository::new(pool.clone());
    let collections = CollectionRepository::new(pool.clone());
    let file_groups = FileGroupRepository::new(pool.clone());
    let archives = ArchiveRepository::new(pool.clone());
    let videos = VideoRepository::new(pool.clone());
    let channels = ChannelRepository::new(pool.clone());
    let downloads = DownloadRepository::new(pool.clone());
    let inventories = InventoryRepository::new(pool.clone());
    let config_versions = ConfigVersionRepository::new(pool.clone());

    // Modelers, after-refresh hooks, refresh pipeline
    let mut modelers = ModelerRegistry::new();
    modelers.register(Arc::new(ArchiveModeler::new(
        config.clone(),
        archives.clone(),
        collections.clone(),
    )));
    modelers.register(Arc::new(VideoModeler::new(
        config.clone(),
        videos.clone(),
        channels.clone(),
    )));

    let mut after_hooks = AfterRefreshRegistry::new();
    register_after_refresh_hooks(
        &mut after_hooks,
        archives.clone(),
        file_groups.clone(),
        collections.clone(),
        switches.clone(),
        events.clone(),
    );

    let refresher = Refresher::new(
        config.clone(),
        flags.clone(),
        events.clone(),
        file_groups.clone(),
        Arc::new(modelers),
        Arc::new(after_hooks),
    );

    // Download manager and its plugins
    let mut registry = DownloaderRegistry::new();
    registry.register(Arc::new(VideoDownloader::new()));
    registry.register(Arc::new(FileDownloader::new()));
    registry.register(Arc::new(ScrapeDownloader::new()));
    registry.register(Arc::new(ArchiveDownloader::new()));

    let context = Arc::new(DownloadContext {
        config: config.clone(),
        events: events.clone(),
        refresher: refresher.clone(),
        archives: archives.clone(),
        videos: videos.clone(),
        collections: collections.clone(),
        channels: channels.clone(),
    });

    let manager_config = DownloadManagerConfig {
        max_workers: config.download_workers,
        poll_interval_ms: config.download_poll_interval_ms,
        download_timeout_seconds: config.download_timeout_seconds,
        max_attempts: config.download_max_attempts,
    };
    let manager = DownloadManager::new(
        downloads.clone(),
        Arc::new(registry),
        context,
        flags.clone(),
        events.clone(),
        manager_config,
        Some(pool.clone()),
    );

    // Config mirrors and their background-dump switches
    let mirrors: Vec<Arc<dyn ConfigMirror>> = vec![
        Arc::new(TagsConfig::new(
            config.clone(),
            flags.clone(),
            tags.clone(),
            config_versions.clone(),
        )),
        Arc::new(DownloadsConfig::new(
            config.clone(),
            flags.clone(),
            downloads.clone(),
            config_versions.clone(),
        )),
        Arc::new(ChannelsConfig::new(
            config.clone(),
            flags.clone(),
            channels.clone(),
            collections.clone(),
            tags.clone(),
            config_versions.clone(),
        )),
        Arc::new(DomainsConfig::new(
            config.clone(),
            flags.clone(),
            collections.clone(),
            tags.clone(),
            config_versions.clone(),
        )),
        Arc::new(InventoriesConfig::new(
            config.clone(),
            flags.clone(),
            inventories.clone(),
            config_versions.clone(),
        )),
    ];
    register_config_switches(&switches, &mirrors);
    let mirrors = Arc::new(ConfigMirrors::new(mirrors, events.clone(), flags.clone()));

    // Collection lifecycle
    let mover = DirectoryMover::new(
        file_groups.clone(),
        downloads.clone(),
        switches.clone(),
        events.clone(),
    );
    let collection_service = CollectionService::new(
        config.clone(),
        flags.clone(),
        events.clone(),
        switches.clone(),
        collections.clone(),
        tags.clone(),
        archives.clone(),
        mover,
        refresher.clone(),
    );

    switches.spawn_worker();

    Ok(Arc::new(AppState {
        config,
        flags,
        events,
        switches,
        pool,
        tags,
        collections,
        file_groups,
        archives,
        videos,
        channels,
        downloads,
        inventories,
        config_versions,
        manager,
        refresher,
        collection_service,
        mirrors,
    }))
}

/// Import every config in dependency order, then release the download
/// flags. Failures are per-config; the service stays up.
pub async fn import_configs_at_startup(state: Arc<AppState>) {
    let results = state.mirrors.import_all_configs().await;
    let failed: Vec<&str> = results
        .iter()
        .filter(|(_, ok)| !**ok)
        .map(|(name, _)| name.as_str())
        .collect();
    if failed.is_empty() {
        tracing::info!("All configs imported");
    } else {
        tracing::error!(?failed, "Some configs failed to import");
    }
    state.events.send("ready", None, None, None, None);
}
