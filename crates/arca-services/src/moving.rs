//! Collection directory moves
//!
//! Moving a collection moves every entry under its old directory, tracked
//! or not, then rewrites FileGroup directories and Download destinations.
//! Relative filenames in the data bag travel with the group untouched.
//! Moves serialize on a shared lock so two moves never race over the same
//! tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arca_core::models::CollectionKind;
use arca_core::{AppError, EventBus};
use arca_db::{DownloadRepository, FileGroupRepository};
use arca_worker::SwitchBus;

#[derive(Clone)]
pub struct DirectoryMover {
    file_groups: FileGroupRepository,
    downloads: DownloadRepository,
    switches: SwitchBus,
    events: EventBus,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl DirectoryMover {
    pub fn new(
        file_groups: FileGroupRepository,
        downloads: DownloadRepository,
        switches: SwitchBus,
        events: EventBus,
    ) -> Self {
        Self {
            file_groups,
            downloads,
            switches,
            events,
            lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Move `old` to `new`: filesystem first, then the DB rows pointing into
    /// the old tree, then the config switch of the owning kind.
    #[tracing::instrument(skip(self))]
    pub async fn move_directory(
        &self,
        old: PathBuf,
        new: PathBuf,
        kind: CollectionKind,
    ) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;

        if old == new {
            return Ok(());
        }

        if old.is_dir() {
            let old_clone = old.clone();
            let new_clone = new.clone();
            tokio::task::spawn_blocking(move || move_tree(&old_clone, &new_clone))
                .await
                .map_err(|e| AppError::Internal(format!("Move task panicked: {}", e)))??;
        }

        let old_str = old.to_string_lossy();
        let new_str = new.to_string_lossy();
        let moved_groups = self.file_groups.move_directory(&old_str, &new_str).await?;
        let moved_downloads = self.downloads.move_destination(&old_str, &new_str).await?;

        tracing::info!(
            old = %old.display(),
            new = %new.display(),
            moved_groups,
            moved_downloads,
            "Collection directory moved"
        );
        self.events.send_user_notify(
            &format!("Moved {} to {}", old.display(), new.display()),
            None,
        );

        match kind {
            CollectionKind::Domain => self.switches.activate_switch("save_domains_config"),
            CollectionKind::Channel => self.switches.activate_switch("save_channels_config"),
            CollectionKind::Manual => {}
        }
        Ok(())
    }
}

/// Move every entry of `old` into `new`, preserving names, then remove
/// `old` if it emptied.
fn move_tree(old: &Path, new: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(new)?;
    for entry in std::fs::read_dir(old)? {
        let entry = entry?;
        let target = new.join(entry.file_name());
        if target.exists() && target.is_dir() && entry.path().is_dir() {
            // Merge directories that exist on both sides.
            move_tree(&entry.path(), &target)?;
        } else {
            std::fs::rename(entry.path(), &target)?;
        }
    }
    if std::fs::read_dir(old)?.next().is_none() {
        std::fs::remove_dir(old)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn moves_files_and_subdirectories() {
        let root = TempDir::new().unwrap();
        let old = root.path().join("archive/example.com");
        let new = root.path().join("archive/news/example.com");
        fs::create_dir_all(old.join("2026")).unwrap();
        fs::write(old.join("A.html"), "a").unwrap();
        fs::write(old.join("2026/B.html"), "b").unwrap();

        move_tree(&old, &new).unwrap();

        assert!(!old.exists());
        assert_eq!(fs::read_to_string(new.join("A.html")).unwrap(), "a");
        assert_eq!(fs::read_to_string(new.join("2026/B.html")).unwrap(), "b");
    }

    #[test]
    fn merges_into_existing_target() {
        let root = TempDir::new().unwrap();
        let old = root.path().join("old");
        let new = root.path().join("new");
        fs::create_dir_all(old.join("sub")).unwrap();
        fs::create_dir_all(new.join("sub")).unwrap();
        fs::write(old.join("sub/a.txt"), "a").unwrap();
        fs::write(new.join("sub/b.txt"), "b").unwrap();

        move_tree(&old, &new).unwrap();

        assert!(new.join("sub/a.txt").is_file());
        assert!(new.join("sub/b.txt").is_file());
        assert!(!old.exists());
    }

    #[test]
    fn untracked_siblings_move_too() {
        let root = TempDir::new().unwrap();
        let old = root.path().join("old");
        let new = root.path().join("new");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("notes.backup"), "x").unwrap();

        move_tree(&old, &new).unwrap();
        assert!(new.join("notes.backup").is_file());
    }
}
