use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Well-known keys of the FileGroup `data` bag. Modelers attach auxiliary
/// files under these keys; values are filenames relative to `directory`.
pub mod data_keys {
    pub const SINGLEFILE: &str = "singlefile_path";
    pub const READABILITY: &str = "readability_path";
    pub const READABILITY_JSON: &str = "readability_json_path";
    pub const READABILITY_TXT: &str = "readability_txt_path";
    pub const SCREENSHOT: &str = "screenshot_path";
    pub const INFO_JSON: &str = "info_json_path";
    pub const POSTER: &str = "poster_path";
    pub const CAPTION: &str = "caption_path";
}

/// The atomic unit of storage: sibling files sharing a stem, treated as one
/// logical artifact.
///
/// `primary_path`, every entry of `files`, and every value in `data` are
/// filenames relative to `directory`. Moving a group rewrites `directory`
/// only; the filenames travel with it untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileGroup {
    pub id: Uuid,
    /// Absolute directory containing every file of the group.
    pub directory: String,
    /// Filename without any suffixes, the grouping key within `directory`.
    pub stem: String,
    /// The representative file of the group, relative to `directory`.
    pub primary_path: String,
    pub mimetype: String,
    pub size: i64,
    /// Surface scan done.
    pub indexed: bool,
    /// Modeler ran (possibly with a `failure` note).
    pub deep_indexed: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub published_datetime: Option<DateTime<Utc>>,
    pub modified_datetime: Option<DateTime<Utc>>,
    // Ranked text fields for weighted search; a = title, d = body.
    pub a_text: Option<String>,
    pub b_text: Option<String>,
    pub c_text: Option<String>,
    pub d_text: Option<String>,
    /// Purpose -> relative filename, e.g. `screenshot_path`.
    pub data: HashMap<String, String>,
    /// Every sibling filename belonging to this group, relative.
    pub files: Vec<String>,
    /// The typed entity this group was promoted to ("archive", "video"), if any.
    pub model: Option<String>,
    /// Modeler failure note; set so the row is not reprocessed forever.
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileGroup {
    /// Absolute path of the primary file.
    pub fn primary_abspath(&self) -> PathBuf {
        Path::new(&self.directory).join(&self.primary_path)
    }

    /// Absolute path of a `data` bag entry, if present.
    pub fn data_path(&self, key: &str) -> Option<PathBuf> {
        self.data
            .get(key)
            .map(|name| Path::new(&self.directory).join(name))
    }

    /// Absolute paths of every file in the group.
    pub fn my_paths(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .map(|name| Path::new(&self.directory).join(name))
            .collect()
    }

    /// Whether any file of this group still exists on disk.
    pub fn any_file_exists(&self) -> bool {
        self.my_paths().iter().any(|p| p.is_file())
    }
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for FileGroup {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(FileGroup {
            id: row.get("id"),
            directory: row.get("directory"),
            stem: row.get("stem"),
            primary_path: row.get("primary_path"),
            mimetype: row.get("mimetype"),
            size: row.get("size"),
            indexed: row.get("indexed"),
            deep_indexed: row.get("deep_indexed"),
            title: row.get("title"),
            author: row.get("author"),
            url: row.get("url"),
            published_datetime: row.get("published_datetime"),
            modified_datetime: row.get("modified_datetime"),
            a_text: row.get("a_text"),
            b_text: row.get("b_text"),
            c_text: row.get("c_text"),
            d_text: row.get("d_text"),
            data: row.get::<Json<HashMap<String, String>>, _>("data").0,
            files: row.get::<Json<Vec<String>>, _>("files").0,
            model: row.get("model"),
            failure: row.get("failure"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_group() -> FileGroup {
        FileGroup {
            id: Uuid::new_v4(),
            directory: "/media/archive/example.com".to_string(),
            stem: "2026-01-01-120000_Example".to_string(),
            primary_path: "2026-01-01-120000_Example.html".to_string(),
            mimetype: "text/html".to_string(),
            size: 1024,
            indexed: true,
            deep_indexed: false,
            title: Some("Example".to_string()),
            author: None,
            url: None,
            published_datetime: None,
            modified_datetime: None,
            a_text: None,
            b_text: None,
            c_text: None,
            d_text: None,
            data: HashMap::from([(
                data_keys::SCREENSHOT.to_string(),
                "2026-01-01-120000_Example.png".to_string(),
            )]),
            files: vec![
                "2026-01-01-120000_Example.html".to_string(),
                "2026-01-01-120000_Example.png".to_string(),
            ],
            model: None,
            failure: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn paths_resolve_against_directory() {
        let fg = file_group();
        assert_eq!(
            fg.primary_abspath(),
            PathBuf::from("/media/archive/example.com/2026-01-01-120000_Example.html")
        );
        assert_eq!(
            fg.data_path(data_keys::SCREENSHOT),
            Some(PathBuf::from(
                "/media/archive/example.com/2026-01-01-120000_Example.png"
            ))
        );
        assert_eq!(fg.data_path(data_keys::POSTER), None);
        assert_eq!(fg.my_paths().len(), 2);
    }

    #[test]
    fn moving_directory_keeps_relative_names() {
        let mut fg = file_group();
        fg.directory = "/media/archive/news/example.com".to_string();
        assert_eq!(
            fg.primary_abspath(),
            PathBuf::from("/media/archive/news/example.com/2026-01-01-120000_Example.html")
        );
    }
}
