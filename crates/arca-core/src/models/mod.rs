pub mod archive;
pub mod channel;
pub mod collection;
pub mod download;
pub mod file_group;
pub mod inventory;
pub mod tag;
pub mod video;

pub use archive::Archive;
pub use channel::Channel;
pub use collection::{Collection, CollectionKind};
pub use download::{retry_backoff_seconds, Download, DownloadStatus, MAX_RETRY_BACKOFF_SECS};
pub use file_group::{data_keys, FileGroup};
pub use inventory::{Inventory, InventoryItem};
pub use tag::Tag;
pub use video::Video;
