//! Download control plane
//!
//! A durable, fingerprint-keyed job queue over `downloads` rows: a pool of
//! workers claims eligible rows, dispatches them to pluggable downloaders,
//! and applies the retry/kill/throttle policies. Plugins treat the external
//! acquirer services as opaque HTTP endpoints.

pub mod downloader;
pub mod manager;
pub mod plugins;
pub mod registry;

pub use downloader::{DownloadContext, DownloadResult, Downloader, KillToken};
pub use manager::{DownloadManager, DownloadManagerConfig};
pub use registry::DownloaderRegistry;
