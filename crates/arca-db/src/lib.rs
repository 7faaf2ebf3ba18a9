//! Database repositories for the data access layer
//!
//! One repository per domain entity, each a thin `Clone` wrapper around the
//! shared `PgPool`. Repositories own the SQL; callers own the transactions
//! of multi-entity operations.

pub mod archive;
pub mod channel;
pub mod collection;
pub mod config_version;
pub mod download;
pub mod file_group;
pub mod inventory;
pub mod tag;
pub mod video;

pub use archive::ArchiveRepository;
pub use channel::ChannelRepository;
pub use collection::{CollectionRepository, CollectionStats};
pub use config_version::ConfigVersionRepository;
pub use download::DownloadRepository;
pub use file_group::FileGroupRepository;
pub use inventory::InventoryRepository;
pub use tag::TagRepository;
pub use video::VideoRepository;
