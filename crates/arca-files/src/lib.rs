//! File indexing pipeline
//!
//! Walks the media root, groups sibling files by stem into FileGroups,
//! surface-indexes them cheaply, then deep-models them into typed entities
//! (archives, videos) via the modeler registry.

pub mod mimetypes;
pub mod modeler;
pub mod modelers;
pub mod refresh;
pub mod singlefile;
pub mod stems;
pub mod walk;

pub use modeler::{AfterRefreshRegistry, Modeler, ModelerRegistry};
pub use refresh::{RefreshSummary, Refresher};
