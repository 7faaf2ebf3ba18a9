//! HTTP surface
//!
//! axum handlers over the arca services: downloads, collections, tags,
//! files/refresh, the event feed, archive upload and inventories.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use error::HttpAppError;
pub use state::AppState;
