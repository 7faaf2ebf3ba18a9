//! Media root discovery
//!
//! Walks the requested paths and groups every regular file by
//! `(directory, stem)`. Each group becomes a FileGroup candidate for the
//! surface index.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::mimetypes::{choose_primary, mime_of};
use crate::stems::stem_of;

/// One discovered group of sibling files.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub directory: PathBuf,
    pub stem: String,
    /// Filenames relative to `directory`, sorted.
    pub files: Vec<String>,
    pub primary: String,
    pub mimetype: String,
    /// Total size of every file in the group.
    pub size: i64,
}

/// Walk `paths`, skipping `skip_dir` (the config directory) and hidden
/// entries. File paths are widened to their parent directory so sibling
/// files always group together.
pub fn discover(paths: &[PathBuf], skip_dir: &Path) -> std::io::Result<Vec<Candidate>> {
    let mut directories: Vec<PathBuf> = Vec::new();
    for path in paths {
        let dir = if path.is_file() {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            path.clone()
        };
        if !directories.contains(&dir) {
            directories.push(dir);
        }
    }

    // (directory, stem) -> (name, size) pairs, sorted for determinism.
    let mut groups: BTreeMap<(PathBuf, String), Vec<(String, i64)>> = BTreeMap::new();

    for root in &directories {
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            // The walk roots themselves are exempt from the hidden check.
            .filter_entry(|e| {
                e.depth() == 0 || (!is_hidden(e.path()) && e.path() != skip_dir)
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry during discovery");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %entry.path().display(), "Skipping non-UTF8 filename");
                continue;
            };
            let directory = entry
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let size = entry.metadata().map(|m| m.len() as i64).unwrap_or(0);
            let stem = stem_of(&name);
            groups
                .entry((directory, stem))
                .or_default()
                .push((name, size));
        }
    }

    let mut candidates = Vec::with_capacity(groups.len());
    for ((directory, stem), mut entries) in groups {
        entries.sort();
        let size = entries.iter().map(|(_, s)| s).sum();
        let files: Vec<String> = entries.into_iter().map(|(name, _)| name).collect();
        let Some(primary) = choose_primary(&files).cloned() else {
            continue;
        };
        let mimetype = mime_of(&primary);
        candidates.push(Candidate {
            directory,
            stem,
            files,
            primary,
            mimetype,
            size,
        });
    }
    Ok(candidates)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn groups_siblings_by_stem() {
        let media = TempDir::new().unwrap();
        let domain = media.path().join("archive/example.com");
        fs::create_dir_all(&domain).unwrap();
        touch(&domain, "A.html", "<html></html>");
        touch(&domain, "A.readability.html", "<html></html>");
        touch(&domain, "A.png", "png");
        touch(&domain, "B.html", "<html></html>");

        let skip = media.path().join("config");
        let candidates = discover(&[media.path().to_path_buf()], &skip).unwrap();
        assert_eq!(candidates.len(), 2);

        let a = candidates.iter().find(|c| c.stem == "A").unwrap();
        assert_eq!(a.files.len(), 3);
        assert_eq!(a.primary, "A.html");
        assert_eq!(a.mimetype, "text/html");
        assert_eq!(a.directory, domain);
    }

    #[test]
    fn skips_config_directory() {
        let media = TempDir::new().unwrap();
        let config = media.path().join("config");
        fs::create_dir_all(&config).unwrap();
        touch(&config, "tags.yaml", "version: 1");
        let archive = media.path().join("archive");
        fs::create_dir_all(&archive).unwrap();
        touch(&archive, "A.html", "x");

        let candidates = discover(&[media.path().to_path_buf()], &config).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].stem, "A");
    }

    #[test]
    fn file_path_widens_to_parent_directory() {
        let media = TempDir::new().unwrap();
        let domain = media.path().join("archive/example.com");
        fs::create_dir_all(&domain).unwrap();
        touch(&domain, "A.html", "x");
        touch(&domain, "A.png", "y");

        let skip = media.path().join("config");
        let candidates = discover(&[domain.join("A.html")], &skip).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].files, vec!["A.html", "A.png"]);
    }

    #[test]
    fn sums_group_size() {
        let media = TempDir::new().unwrap();
        let dir = media.path().join("archive/d.com");
        fs::create_dir_all(&dir).unwrap();
        touch(&dir, "A.html", "12345");
        touch(&dir, "A.png", "123");

        let skip = media.path().join("config");
        let candidates = discover(&[media.path().to_path_buf()], &skip).unwrap();
        assert_eq!(candidates[0].size, 8);
    }
}
