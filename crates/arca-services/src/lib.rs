//! Domain services
//!
//! Multi-entity operations that do not belong to one repository: the
//! collection lifecycle (tagging computes a target directory and moves every
//! owned file), the serialized directory mover, and the cleanup hooks that
//! run after each full refresh.

pub mod collections;
pub mod hooks;
pub mod moving;

pub use collections::{CollectionService, CollectionView, TagInfo, TagOutcome};
pub use moving::DirectoryMover;
