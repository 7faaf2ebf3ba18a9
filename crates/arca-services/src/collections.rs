//! Collection lifecycle
//!
//! Tagging a collection computes its target directory, applies the tag,
//! moves every owned file when the directory changed, and reactivates the
//! config switch of its kind. Untagging with the original directory
//! restores the pre-tag state, files included.

use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use arca_core::models::{Collection, CollectionKind};
use arca_core::{AppConfig, AppError, EventBus, RuntimeFlags};
use arca_db::{
    ArchiveRepository, CollectionRepository, CollectionStats, TagRepository,
};
use arca_files::Refresher;
use arca_worker::SwitchBus;

use crate::moving::DirectoryMover;

/// A collection with its per-kind statistics for listings.
#[derive(Debug, Serialize)]
pub struct CollectionView {
    #[serde(flatten)]
    pub collection: Collection,
    pub tag_name: Option<String>,
    pub item_count: i64,
    pub size: i64,
    pub min_download_frequency: Option<i64>,
}

/// Result of a tag/untag operation.
#[derive(Debug, Serialize)]
pub struct TagOutcome {
    pub collection_id: Uuid,
    pub collection_name: String,
    pub tag_name: Option<String>,
    /// New directory, relative to the media root.
    pub directory: Option<String>,
    pub will_move_files: bool,
}

/// Directory suggestion and conflict report for a prospective tag.
#[derive(Debug, Serialize)]
pub struct TagInfo {
    pub suggested_directory: Option<String>,
    pub conflict: bool,
    pub conflict_message: Option<String>,
}

#[derive(Clone)]
pub struct CollectionService {
    config: AppConfig,
    flags: RuntimeFlags,
    events: EventBus,
    switches: SwitchBus,
    collections: CollectionRepository,
    tags: TagRepository,
    archives: ArchiveRepository,
    mover: DirectoryMover,
    refresher: Refresher,
}

impl CollectionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        flags: RuntimeFlags,
        events: EventBus,
        switches: SwitchBus,
        collections: CollectionRepository,
        tags: TagRepository,
        archives: ArchiveRepository,
        mover: DirectoryMover,
        refresher: Refresher,
    ) -> Self {
        Self {
            config,
            flags,
            events,
            switches,
            collections,
            tags,
            archives,
            mover,
            refresher,
        }
    }

    fn check_wrol(&self) -> Result<(), AppError> {
        if self.flags.is_wrol_mode() || self.config.is_wrol_mode() {
            return Err(AppError::WrolMode(
                "Collections cannot be modified while WROL mode is enabled".to_string(),
            ));
        }
        Ok(())
    }

    fn activate_save_switch(&self, kind: CollectionKind) {
        match kind {
            CollectionKind::Domain => self.switches.activate_switch("save_domains_config"),
            CollectionKind::Channel => self.switches.activate_switch("save_channels_config"),
            CollectionKind::Manual => {}
        }
    }

    async fn view(&self, collection: Collection) -> Result<CollectionView, AppError> {
        let stats: CollectionStats = self.collections.stats(&collection).await?;
        let tag_name = match collection.tag_id {
            Some(tag_id) => self.tags.get(tag_id).await?.map(|t| t.name),
            None => None,
        };
        Ok(CollectionView {
            collection,
            tag_name,
            item_count: stats.item_count,
            size: stats.size,
            min_download_frequency: stats.min_download_frequency,
        })
    }

    pub async fn list(&self, kind: Option<CollectionKind>) -> Result<Vec<CollectionView>, AppError> {
        let collections = self.collections.list(kind).await?;
        let mut views = Vec::with_capacity(collections.len());
        for collection in collections {
            views.push(self.view(collection).await?);
        }
        Ok(views)
    }

    pub async fn get_with_stats(&self, id: Uuid) -> Result<CollectionView, AppError> {
        let collection = self.collections.find(id).await?;
        self.view(collection).await
    }

    pub async fn search(
        &self,
        kind: Option<CollectionKind>,
        tag_names: Option<&[String]>,
        search_str: Option<&str>,
    ) -> Result<Vec<CollectionView>, AppError> {
        let collections = self.collections.search(kind, tag_names, search_str).await?;
        let mut views = Vec::with_capacity(collections.len());
        for collection in collections {
            views.push(self.view(collection).await?);
        }
        Ok(views)
    }

    /// Update a collection in place. An empty `directory` clears it; an
    /// empty `tag_name` clears the tag; tagging requires a directory.
    pub async fn update_collection(
        &self,
        id: Uuid,
        directory: Option<String>,
        tag_name: Option<String>,
        description: Option<String>,
    ) -> Result<Collection, AppError> {
        self.check_wrol()?;
        let collection = self.collections.find(id).await?;

        let new_directory: Option<Option<String>> = match directory {
            Some(dir) if dir.is_empty() => Some(None),
            Some(dir) => {
                let resolved = self.config.resolve_media_path(&dir)?;
                Some(Some(resolved.to_string_lossy().into_owned()))
            }
            None => None,
        };

        let effective_directory = new_directory
            .clone()
            .unwrap_or_else(|| collection.directory.clone());

        let new_tag: Option<Option<Uuid>> = match tag_name {
            Some(name) if name.is_empty() => Some(None),
            Some(name) => {
                if effective_directory.is_none() {
                    return Err(AppError::Validation(format!(
                        "Collection '{}' has no directory. Set a directory before tagging.",
                        collection.name
                    )));
                }
                let tag = self.tags.find_or_create(&name, None).await?;
                Some(Some(tag.id))
            }
            None => None,
        };

        let updated = self
            .collections
            .update(
                id,
                new_directory.as_ref().map(|d| d.as_deref()),
                new_tag,
                description.as_deref(),
            )
            .await?;

        self.activate_save_switch(updated.kind);
        Ok(updated)
    }

    /// Tag a collection (optionally moving it), or remove the tag when
    /// `tag_name` is `None`, optionally moving it back.
    pub async fn tag_collection(
        &self,
        id: Uuid,
        tag_name: Option<String>,
        directory: Option<String>,
    ) -> Result<TagOutcome, AppError> {
        self.check_wrol()?;
        let collection = self.collections.find(id).await?;
        let old_directory = collection.directory.clone();

        let tag_id = match &tag_name {
            Some(name) => Some(self.tags.find_or_create(name, None).await?.id),
            None => None,
        };

        // Target directory: explicit beats computed beats current.
        let target_directory: Option<String> = match &directory {
            Some(dir) => {
                let resolved = self.config.resolve_media_path(dir)?;
                Some(resolved.to_string_lossy().into_owned())
            }
            None => match (&tag_name, &collection.directory) {
                (Some(name), Some(_)) => collection
                    .format_directory(&self.config.media_directory, Some(name))
                    .map(|p| p.to_string_lossy().into_owned()),
                _ => collection.directory.clone(),
            },
        };

        if tag_name.is_some() && target_directory.is_none() && collection.directory.is_none() {
            return Err(AppError::Validation(format!(
                "Collection '{}' has no directory. Set a directory before tagging.",
                collection.name
            )));
        }

        let updated = self
            .collections
            .set_tag_and_directory(id, tag_id, target_directory.as_deref())
            .await?;

        // Move the files when the directory changed and the old one exists.
        let will_move_files = match (&old_directory, &target_directory) {
            (Some(old), Some(new)) if old != new => PathBuf::from(old).exists(),
            _ => false,
        };
        if will_move_files {
            if let (Some(old), Some(new)) = (old_directory.clone(), target_directory.clone()) {
                let mover = self.mover.clone();
                let kind = updated.kind;
                let events = self.events.clone();
                tokio::spawn(async move {
                    let (old, new) = (PathBuf::from(old), PathBuf::from(new));
                    if let Err(e) = mover.move_directory(old, new, kind).await {
                        tracing::error!(error = %e, "Collection move failed");
                        events.send_user_notify(&format!("Moving collection failed: {}", e), None);
                    }
                });
            }
        }

        self.activate_save_switch(updated.kind);

        let relative = target_directory.as_ref().and_then(|d| {
            self.config
                .relative_to_media(&PathBuf::from(d))
                .map(|p| p.to_string_lossy().into_owned())
        });
        Ok(TagOutcome {
            collection_id: updated.id,
            collection_name: updated.name,
            tag_name,
            directory: relative,
            will_move_files,
        })
    }

    /// Suggested directory and conflicts for tagging with `tag_name`.
    pub async fn get_tag_info(
        &self,
        id: Uuid,
        tag_name: Option<&str>,
    ) -> Result<TagInfo, AppError> {
        let collection = self.collections.find(id).await?;

        if collection.directory.is_none() {
            return Ok(TagInfo {
                suggested_directory: None,
                conflict: false,
                conflict_message: None,
            });
        }

        let suggested = collection.format_directory(&self.config.media_directory, tag_name);
        let mut conflict = false;
        let mut conflict_message = None;

        if let (Some(suggested), CollectionKind::Domain) = (&suggested, collection.kind) {
            if let Some(existing) = self
                .collections
                .get_by_directory(&suggested.to_string_lossy())
                .await?
            {
                if existing.id != collection.id && existing.kind == CollectionKind::Domain {
                    conflict = true;
                    conflict_message = Some(format!(
                        "A domain collection '{}' already uses this directory. \
                         Choose a different tag or directory.",
                        existing.name
                    ));
                }
            }
        }

        let relative = suggested.as_ref().and_then(|p| {
            self.config
                .relative_to_media(p)
                .map(|r| r.to_string_lossy().into_owned())
        });
        Ok(TagInfo {
            suggested_directory: relative,
            conflict,
            conflict_message,
        })
    }

    /// Delete a collection, orphaning its child archives.
    pub async fn delete_collection(&self, id: Uuid) -> Result<Collection, AppError> {
        self.check_wrol()?;
        let collection = self.collections.find(id).await?;

        if collection.kind == CollectionKind::Domain {
            self.archives.orphan_collection(id).await?;
        }
        self.collections.delete(id).await?;
        self.activate_save_switch(collection.kind);
        self.events
            .send_deleted(&format!("Deleted collection {}", collection.name));
        Ok(collection)
    }

    /// Refresh every file in the collection's directory.
    pub async fn refresh_collection(&self, id: Uuid) -> Result<(), AppError> {
        let collection = self.collections.find(id).await?;
        let Some(directory) = collection.directory else {
            return Err(AppError::Validation(format!(
                "Collection '{}' has no directory. Set a directory before refreshing.",
                collection.name
            )));
        };

        let refresher = self.refresher.clone();
        let path = PathBuf::from(&directory);
        tokio::spawn(async move {
            if let Err(e) = refresher.refresh(vec![path]).await {
                tracing::error!(error = %e, "Collection refresh failed");
            }
        });

        if let Some(relative) = self.config.relative_to_media(&PathBuf::from(&directory)) {
            self.events
                .send_directory_refresh(&format!("Refreshing: {}", relative.display()));
        }
        Ok(())
    }
}
