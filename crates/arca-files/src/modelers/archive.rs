//! Archive modeler
//!
//! Promotes an HTML FileGroup containing a SingleFile snapshot into an
//! Archive. The readability variants, screenshot and extracted text become
//! data-bag entries and ranked text fields; the archive is associated with
//! its domain collection, inferred from the directory the file lives in.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use arca_core::models::{data_keys, CollectionKind, FileGroup};
use arca_core::AppConfig;
use arca_db::{ArchiveRepository, CollectionRepository};

use crate::modeler::Modeler;
use crate::singlefile;
use crate::stems::suffix_of;

/// How much of the singlefile is read when hunting for a `<title>`.
const TITLE_READ_LEN: usize = 64 * 1024;

/// The fields of a readability JSON sidecar we trust. Readability data wins
/// over the SingleFile header when both disagree.
#[derive(Debug, Default, Deserialize)]
struct ReadabilityJson {
    url: Option<String>,
    title: Option<String>,
    excerpt: Option<String>,
}

pub struct ArchiveModeler {
    config: AppConfig,
    archives: ArchiveRepository,
    collections: CollectionRepository,
}

impl ArchiveModeler {
    pub fn new(
        config: AppConfig,
        archives: ArchiveRepository,
        collections: CollectionRepository,
    ) -> Self {
        Self {
            config,
            archives,
            collections,
        }
    }

    /// The domain collection's directory for a file living at `directory`.
    ///
    /// Walks up until the directory matches `<archive>/[<tag>/]<domain>`;
    /// `year/` subfolders from the archive file format never become the
    /// collection directory. Domains are recognized by containing a dot.
    fn infer_domain_directory(&self, directory: &Path, domain: &str) -> PathBuf {
        let archive_root = self.config.archive_directory();
        if let Ok(relative) = directory.strip_prefix(&archive_root) {
            let components: Vec<&str> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(os) => os.to_str(),
                    _ => None,
                })
                .collect();
            if let Some(first) = components.first() {
                if first.contains('.') {
                    return archive_root.join(first);
                }
                if let Some(second) = components.get(1) {
                    if second.contains('.') {
                        return archive_root.join(first).join(second);
                    }
                }
            }
        }
        archive_root.join(domain)
    }

    fn classify_files(&self, file_group: &FileGroup) -> ArchiveFiles {
        let mut found = ArchiveFiles::default();
        for name in &file_group.files {
            let suffix = suffix_of(name).to_ascii_lowercase();
            match suffix.as_str() {
                "readability.html" => found.readability = Some(name.clone()),
                "readability.json" => found.readability_json = Some(name.clone()),
                "readability.txt" => found.readability_txt = Some(name.clone()),
                "html" | "htm" => {
                    let path = Path::new(&file_group.directory).join(name);
                    if singlefile::is_singlefile_file(&path) {
                        found.singlefile = Some(name.clone());
                    }
                }
                "png" | "jpg" | "jpeg" | "webp" => found.screenshot = Some(name.clone()),
                _ => {}
            }
        }
        found
    }
}

#[derive(Debug, Default)]
struct ArchiveFiles {
    singlefile: Option<String>,
    readability: Option<String>,
    readability_json: Option<String>,
    readability_txt: Option<String>,
    screenshot: Option<String>,
}

#[async_trait]
impl Modeler for ArchiveModeler {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn mimetype_prefix(&self) -> &'static str {
        "text/html"
    }

    async fn model(&self, file_group: &mut FileGroup) -> Result<bool> {
        let files = self.classify_files(file_group);

        // A group without a SingleFile snapshot is not an archive. An orphan
        // readability file stays unclaimed rather than becoming a bogus
        // Archive row.
        let Some(singlefile) = files.singlefile else {
            return Ok(false);
        };

        let directory = Path::new(&file_group.directory).to_path_buf();
        let singlefile_path = directory.join(&singlefile);

        let head = singlefile::read_head(&singlefile_path)
            .with_context(|| format!("Cannot read {}", singlefile_path.display()))?;
        let header = singlefile::parse_header(&head).unwrap_or_default();

        let readability: ReadabilityJson = match &files.readability_json {
            Some(name) => {
                let path = directory.join(name);
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Cannot read {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Invalid readability JSON {}", path.display()))?
            }
            None => ReadabilityJson::default(),
        };

        // Readability is most trusted; it overwrites the header fields.
        let url = readability.url.or(header.url);
        let archive_datetime = header.saved_at;

        let title = readability
            .title
            .or_else(|| read_html_title(&singlefile_path))
            .or_else(|| file_group.title.clone());

        let article = match &files.readability_txt {
            Some(name) => std::fs::read_to_string(directory.join(name)).ok(),
            None => None,
        };

        // Associate with the domain collection when the URL has a hostname.
        let collection_id = match url.as_deref().and_then(hostname_of) {
            Some(domain) => {
                let collection_directory = self.infer_domain_directory(&directory, &domain);
                let collection = self
                    .collections
                    .find_or_create(
                        &domain,
                        CollectionKind::Domain,
                        Some(&collection_directory.to_string_lossy()),
                    )
                    .await?;
                Some(collection.id)
            }
            None => None,
        };

        let archive = self.archives.find_or_create(file_group.id).await?;
        self.archives
            .update(archive.id, url.as_deref(), archive_datetime, collection_id)
            .await?;

        file_group.data.insert(data_keys::SINGLEFILE.into(), singlefile);
        if let Some(name) = files.readability {
            file_group.data.insert(data_keys::READABILITY.into(), name);
        }
        if let Some(name) = files.readability_json {
            file_group
                .data
                .insert(data_keys::READABILITY_JSON.into(), name);
        }
        if let Some(name) = files.readability_txt {
            file_group
                .data
                .insert(data_keys::READABILITY_TXT.into(), name);
        }
        if let Some(name) = files.screenshot {
            file_group.data.insert(data_keys::SCREENSHOT.into(), name);
        }

        file_group.url = url;
        file_group.title = title.clone();
        file_group.published_datetime = archive_datetime;
        file_group.a_text = title;
        file_group.b_text = readability.excerpt;
        file_group.d_text = article;

        Ok(true)
    }
}

fn read_html_title(path: &Path) -> Option<String> {
    use std::io::Read;
    let mut file = std::fs::File::open(path).ok()?;
    let mut buffer = vec![0_u8; TITLE_READ_LEN];
    let read = file.read(&mut buffer).ok()?;
    buffer.truncate(read);
    singlefile::title_from_html(&String::from_utf8_lossy(&buffer))
}

fn hostname_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn modeler_at(media: &Path) -> ArchiveModeler {
        // Repositories are never touched by the pure helpers under test.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        ArchiveModeler::new(
            AppConfig::with_media_directory(media),
            ArchiveRepository::new(pool.clone()),
            CollectionRepository::new(pool),
        )
    }

    #[tokio::test]
    async fn domain_directory_direct() {
        let media = TempDir::new().unwrap();
        let modeler = modeler_at(media.path());
        let directory = media.path().join("archive/example.com");
        assert_eq!(
            modeler.infer_domain_directory(&directory, "example.com"),
            media.path().join("archive/example.com")
        );
    }

    #[tokio::test]
    async fn domain_directory_skips_year_subfolder() {
        let media = TempDir::new().unwrap();
        let modeler = modeler_at(media.path());
        let directory = media.path().join("archive/fileformat-test.com/2026");
        assert_eq!(
            modeler.infer_domain_directory(&directory, "fileformat-test.com"),
            media.path().join("archive/fileformat-test.com")
        );
    }

    #[tokio::test]
    async fn domain_directory_with_tag_segment() {
        let media = TempDir::new().unwrap();
        let modeler = modeler_at(media.path());
        let directory = media.path().join("archive/news/example.com/2026");
        assert_eq!(
            modeler.infer_domain_directory(&directory, "example.com"),
            media.path().join("archive/news/example.com")
        );
    }

    #[tokio::test]
    async fn domain_directory_outside_archive_falls_back() {
        let media = TempDir::new().unwrap();
        let modeler = modeler_at(media.path());
        let directory = media.path().join("somewhere/else");
        assert_eq!(
            modeler.infer_domain_directory(&directory, "example.com"),
            media.path().join("archive/example.com")
        );
    }

    #[test]
    fn hostname_extraction() {
        assert_eq!(
            hostname_of("https://example.com/a"),
            Some("example.com".to_string())
        );
        assert_eq!(hostname_of("garbage"), None);
    }
}
