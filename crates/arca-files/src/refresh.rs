//! The refresh pipeline
//!
//! discover -> surface index -> deep model -> after-hooks -> orphan delete,
//! all behind a single refreshing flag. Re-entry while a refresh runs is a
//! no-op. Per-group modeler failures are recorded on the row and the
//! pipeline keeps going; only catastrophic failures abort the refresh (the
//! flag guard clears on unwind).

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use arca_core::models::FileGroup;
use arca_core::{AppConfig, AppError, EventBus, RuntimeFlags};
use arca_db::FileGroupRepository;

use crate::modeler::{AfterRefreshRegistry, ModelerRegistry};
use crate::walk;

#[derive(Debug, Default, Clone)]
pub struct RefreshSummary {
    /// False when another refresh was already in progress.
    pub started: bool,
    pub surface_indexed: usize,
    pub modeled: usize,
    pub failed: usize,
    pub deleted: usize,
}

#[derive(Clone)]
pub struct Refresher {
    config: AppConfig,
    flags: RuntimeFlags,
    events: EventBus,
    file_groups: FileGroupRepository,
    modelers: Arc<ModelerRegistry>,
    after_hooks: Arc<AfterRefreshRegistry>,
}

impl Refresher {
    pub fn new(
        config: AppConfig,
        flags: RuntimeFlags,
        events: EventBus,
        file_groups: FileGroupRepository,
        modelers: Arc<ModelerRegistry>,
        after_hooks: Arc<AfterRefreshRegistry>,
    ) -> Self {
        Self {
            config,
            flags,
            events,
            file_groups,
            modelers,
            after_hooks,
        }
    }

    /// Refresh the given paths, or the entire media root when none given.
    #[tracing::instrument(skip(self, paths))]
    pub async fn refresh(&self, paths: Vec<PathBuf>) -> Result<RefreshSummary, AppError> {
        let Some(_guard) = self.flags.begin_refresh() else {
            tracing::info!("Refresh already in progress, ignoring");
            return Ok(RefreshSummary::default());
        };

        let full_refresh = paths.is_empty();
        let paths = if full_refresh {
            vec![self.config.media_directory.clone()]
        } else {
            paths
        };
        self.events.send_global_refresh_started(None);

        let mut summary = RefreshSummary {
            started: true,
            ..Default::default()
        };

        // Phase 1: discovery.
        let skip_dir = self.config.config_directory();
        let walk_paths = paths.clone();
        let candidates =
            tokio::task::spawn_blocking(move || walk::discover(&walk_paths, &skip_dir))
                .await
                .map_err(|e| AppError::Internal(format!("Discovery task panicked: {}", e)))??;
        self.events.send_global_refresh_discovery_completed();

        // Phase 2: surface index.
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for candidate in &candidates {
            let directory = candidate.directory.to_string_lossy().into_owned();
            let title = title_from_stem(&candidate.stem);
            self.file_groups
                .upsert_surface(
                    &directory,
                    &candidate.stem,
                    &candidate.primary,
                    &candidate.mimetype,
                    candidate.size,
                    Some(&title),
                    &candidate.files,
                )
                .await?;
            seen.insert((directory, candidate.stem.clone()));
            summary.surface_indexed += 1;
        }
        self.events.send_global_refresh_indexing_completed();

        // Rows under the refreshed paths whose files vanished are deleted in
        // phase 5, after modeling and hooks.
        let refreshed_dirs: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let known = self
            .file_groups
            .list_under_directories(&refreshed_dirs)
            .await?;
        let missing: Vec<uuid::Uuid> = known
            .iter()
            .filter(|fg| !seen.contains(&(fg.directory.clone(), fg.stem.clone())))
            .filter(|fg| !fg.any_file_exists())
            .map(|fg| fg.id)
            .collect();

        // Phase 3: deep model in bounded batches. The stop condition compares
        // the fetched-row count against the requested limit; an enumeration
        // index would exit one batch early.
        let limit = self.config.refresh_batch_size;
        loop {
            let batch = self.file_groups.select_unmodeled(limit).await?;
            let fetched = batch.len();
            for file_group in batch {
                // A DB failure here is catastrophic: the row could not be
                // marked either way and would be re-fetched forever.
                if self.model_one(file_group).await? {
                    summary.modeled += 1;
                } else {
                    summary.failed += 1;
                }
            }
            if (fetched as i64) < limit {
                break;
            }
        }
        self.events.send_global_refresh_modeling_completed();

        // Phase 4: after-refresh hooks, once per full refresh.
        if full_refresh {
            self.after_hooks.run_all().await;
            self.events.send_global_after_refresh_completed();
        }

        // Phase 5: delete orphaned rows; typed entities cascade.
        summary.deleted = self.file_groups.delete_ids(&missing).await? as usize;

        self.events.send_refresh_completed(Some(&format!(
            "Refreshed {} file groups",
            summary.surface_indexed
        )));
        Ok(summary)
    }

    /// Run matching modelers over one group. Modeler failures are recorded
    /// on the row so it is not retried forever; only a failure to persist
    /// the outcome propagates. Returns whether the group modeled cleanly.
    async fn model_one(&self, mut file_group: FileGroup) -> Result<bool, AppError> {
        let modelers = self.modelers.matching(&file_group.mimetype);

        let mut failure: Option<String> = None;
        for modeler in modelers {
            match modeler.model(&mut file_group).await {
                Ok(true) => {
                    file_group.model = Some(modeler.name().to_string());
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!(
                        file_group = %file_group.id,
                        modeler = modeler.name(),
                        error = %e,
                        "Modeler failed"
                    );
                    failure = Some(format!("{}: {}", modeler.name(), e));
                    break;
                }
            }
        }

        match failure {
            Some(failure) => {
                self.file_groups.mark_failure(file_group.id, &failure).await?;
                Ok(false)
            }
            None => {
                self.file_groups.update_modeled(&file_group).await?;
                Ok(true)
            }
        }
    }
}

/// A human title guessed from a stem: timestamp prefixes dropped,
/// underscores spaced.
fn title_from_stem(stem: &str) -> String {
    let title = match stem.split_once('_') {
        Some((prefix, rest)) if looks_like_timestamp(prefix) && !rest.is_empty() => rest,
        _ => stem,
    };
    title.replace('_', " ")
}

fn looks_like_timestamp(value: &str) -> bool {
    value.len() >= 8 && value.chars().all(|c| c.is_ascii_digit() || c == '-' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_timestamped_stem() {
        assert_eq!(
            title_from_stem("2026-01-01-120000_Some_Article"),
            "Some Article"
        );
        assert_eq!(title_from_stem("Some_Article"), "Some Article");
        assert_eq!(title_from_stem("NoUnderscore"), "NoUnderscore");
    }

    #[test]
    fn timestamp_detection() {
        assert!(looks_like_timestamp("2026-01-01-120000"));
        assert!(looks_like_timestamp("20260101"));
        assert!(!looks_like_timestamp("short"));
        assert!(!looks_like_timestamp("Article"));
    }
}
