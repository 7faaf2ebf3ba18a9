//! Arca core library
//!
//! This crate provides the domain models, error types, configuration, runtime
//! flags, and the event ring buffer shared across all arca components.

pub mod config;
pub mod download_error;
pub mod error;
pub mod events;
pub mod flags;
pub mod models;
pub mod pagination;

// Re-export commonly used types
pub use config::AppConfig;
pub use download_error::{DownloadError, DownloadResultExt};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use events::{Event, EventBus};
pub use flags::{RefreshGuard, RuntimeFlags};
