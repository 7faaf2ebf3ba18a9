//! After-refresh cleanup hooks
//!
//! Registered once at startup and run by the refresh pipeline after each
//! full refresh. Both hooks are idempotent and safe to run repeatedly.

use arca_core::models::data_keys;
use arca_core::EventBus;
use arca_db::{ArchiveRepository, CollectionRepository, FileGroupRepository};
use arca_files::singlefile::is_singlefile_file;
use arca_files::AfterRefreshRegistry;
use arca_worker::SwitchBus;

const REAP_BATCH_SIZE: i64 = 100;

/// Delete archives whose singlefile is gone or was never a real SingleFile
/// snapshot. Sweeps the whole table in bounded batches; the stop condition
/// compares the fetched-row count against the batch size so a full batch
/// continues to the next one.
pub async fn reap_invalid_archives(
    archives: &ArchiveRepository,
    file_groups: &FileGroupRepository,
) -> anyhow::Result<()> {
    tracing::info!("Searching for invalid archives");
    let mut offset: i64 = 0;
    let limit = REAP_BATCH_SIZE;
    let mut reaped: u64 = 0;

    loop {
        let batch = archives.list_page(offset, limit).await?;
        let fetched = batch.len() as i64;
        let mut deleted: i64 = 0;

        for archive in batch {
            let file_group = file_groups.get(archive.file_group_id).await?;
            let valid = match &file_group {
                Some(fg) => fg
                    .data_path(data_keys::SINGLEFILE)
                    .map(|p| is_singlefile_file(&p))
                    .unwrap_or(false),
                None => false,
            };
            if !valid {
                archives.delete(archive.id).await?;
                deleted += 1;
                reaped += 1;
            }
        }

        if fetched < limit {
            break;
        }
        offset += limit - deleted;
    }

    if reaped > 0 {
        tracing::info!(reaped, "Reaped invalid archives");
    }
    Ok(())
}

/// Delete domain collections with no archives and no downloads. Collections
/// still referenced by a config entry keep a download or archive attached,
/// so they survive this hook.
pub async fn delete_empty_collections(
    collections: &CollectionRepository,
    switches: &SwitchBus,
    events: &EventBus,
) -> anyhow::Result<()> {
    let empty = collections.list_empty_domains().await?;
    if empty.is_empty() {
        return Ok(());
    }

    for collection in &empty {
        tracing::info!(collection = %collection.name, "Deleting empty domain collection");
        collections.delete(collection.id).await?;
        events.send_deleted(&format!("Deleted empty collection {}", collection.name));
    }
    switches.activate_switch("save_domains_config");
    Ok(())
}

/// Register both hooks with the refresh pipeline.
pub fn register_after_refresh_hooks(
    registry: &mut AfterRefreshRegistry,
    archives: ArchiveRepository,
    file_groups: FileGroupRepository,
    collections: CollectionRepository,
    switches: SwitchBus,
    events: EventBus,
) {
    {
        let archives = archives.clone();
        let file_groups = file_groups.clone();
        registry.register("reap_invalid_archives", move || {
            let archives = archives.clone();
            let file_groups = file_groups.clone();
            async move { reap_invalid_archives(&archives, &file_groups).await }
        });
    }

    registry.register("delete_empty_collections", move || {
        let collections = collections.clone();
        let switches = switches.clone();
        let events = events.clone();
        async move { delete_empty_collections(&collections, &switches, &events).await }
    });
}
