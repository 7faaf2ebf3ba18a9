//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;

use arca_config::ConfigMirrors;
use arca_core::{AppConfig, EventBus, RuntimeFlags};
use arca_db::{
    ArchiveRepository, ChannelRepository, CollectionRepository, ConfigVersionRepository,
    DownloadRepository, FileGroupRepository, InventoryRepository, TagRepository, VideoRepository,
};
use arca_downloads::DownloadManager;
use arca_files::Refresher;
use arca_services::CollectionService;
use arca_worker::SwitchBus;

pub struct AppState {
    pub config: AppConfig,
    pub flags: RuntimeFlags,
    pub events: EventBus,
    pub switches: SwitchBus,
    pub pool: PgPool,
    // Repositories
    pub tags: TagRepository,
    pub collections: CollectionRepository,
    pub file_groups: FileGroupRepository,
    pub archives: ArchiveRepository,
    pub videos: VideoRepository,
    pub channels: ChannelRepository,
    pub downloads: DownloadRepository,
    pub inventories: InventoryRepository,
    pub config_versions: ConfigVersionRepository,
    // Services
    pub manager: DownloadManager,
    pub refresher: Refresher,
    pub collection_service: CollectionService,
    pub mirrors: Arc<ConfigMirrors>,
}
