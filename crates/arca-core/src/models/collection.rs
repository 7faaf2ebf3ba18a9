use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a collection groups. Domain collections own archive directories,
/// channel collections own video directories, manual collections are
/// user-curated and may be unrestricted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Domain,
    Channel,
    Manual,
}

impl CollectionKind {
    /// The top-level media directory this kind lives under, if any.
    pub fn kind_root(&self) -> Option<&'static str> {
        match self {
            CollectionKind::Domain => Some("archive"),
            CollectionKind::Channel => Some("videos"),
            CollectionKind::Manual => None,
        }
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CollectionKind::Domain => write!(f, "domain"),
            CollectionKind::Channel => write!(f, "channel"),
            CollectionKind::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for CollectionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domain" => Ok(CollectionKind::Domain),
            "channel" => Ok(CollectionKind::Channel),
            "manual" => Ok(CollectionKind::Manual),
            _ => Err(anyhow::anyhow!("Invalid collection kind: {}", s)),
        }
    }
}

/// A polymorphic group of file groups identified by `(name, kind)`.
///
/// `directory IS NULL` means unrestricted; an unrestricted collection cannot
/// be tagged, because tagging computes a tagged directory to move files into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub kind: CollectionKind,
    pub directory: Option<String>,
    pub tag_id: Option<Uuid>,
    pub description: Option<String>,
    /// Filename layout override for content acquired into this collection.
    pub file_format: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    pub fn can_be_tagged(&self) -> bool {
        self.directory.is_some()
    }

    /// The deterministic directory for this collection under the media root:
    /// `<media>/<kind_root>/<tag>/<name>` when tagged, without the tag
    /// segment otherwise. `None` for kinds without a root (manual).
    pub fn format_directory(&self, media_directory: &Path, tag_name: Option<&str>) -> Option<PathBuf> {
        let root = self.kind.kind_root()?;
        let mut directory = media_directory.join(root);
        if let Some(tag) = tag_name {
            directory = directory.join(tag);
        }
        Some(directory.join(&self.name))
    }
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Collection {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Collection {
            id: row.get("id"),
            name: row.get("name"),
            kind: row.get::<String, _>("kind").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse collection kind: {}", e).into())
            })?,
            directory: row.get("directory"),
            tag_id: row.get("tag_id"),
            description: row.get("description"),
            file_format: row.get("file_format"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(kind: CollectionKind, directory: Option<&str>) -> Collection {
        Collection {
            id: Uuid::new_v4(),
            name: "example.com".to_string(),
            kind,
            directory: directory.map(str::to_string),
            tag_id: None,
            description: None,
            file_format: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn kind_display_round_trip() {
        for kind in [
            CollectionKind::Domain,
            CollectionKind::Channel,
            CollectionKind::Manual,
        ] {
            assert_eq!(kind.to_string().parse::<CollectionKind>().unwrap(), kind);
        }
        assert!("playlist".parse::<CollectionKind>().is_err());
    }

    #[test]
    fn untagged_format_directory() {
        let c = collection(CollectionKind::Domain, Some("/m/archive/example.com"));
        assert_eq!(
            c.format_directory(Path::new("/m"), None),
            Some(PathBuf::from("/m/archive/example.com"))
        );
    }

    #[test]
    fn tagged_format_directory_inserts_tag_segment() {
        let c = collection(CollectionKind::Domain, Some("/m/archive/example.com"));
        assert_eq!(
            c.format_directory(Path::new("/m"), Some("news")),
            Some(PathBuf::from("/m/archive/news/example.com"))
        );
    }

    #[test]
    fn channel_format_directory_uses_videos_root() {
        let mut c = collection(CollectionKind::Channel, Some("/m/videos/SomeChannel"));
        c.name = "SomeChannel".to_string();
        assert_eq!(
            c.format_directory(Path::new("/m"), Some("lectures")),
            Some(PathBuf::from("/m/videos/lectures/SomeChannel"))
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        let c = collection(CollectionKind::Domain, Some("/m/archive/example.com"));
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["kind"], "domain");
    }

    #[test]
    fn tagged_collection_requires_directory() {
        let restricted = collection(CollectionKind::Domain, Some("/m/archive/example.com"));
        assert!(restricted.can_be_tagged());

        let unrestricted = collection(CollectionKind::Manual, None);
        assert!(!unrestricted.can_be_tagged());
    }

    #[test]
    fn manual_collections_have_no_formatted_directory() {
        let c = collection(CollectionKind::Manual, None);
        assert_eq!(c.format_directory(Path::new("/m"), Some("news")), None);
        assert!(!c.can_be_tagged());
    }
}
