//! Configuration module
//!
//! Environment-driven configuration plus the media directory layout. The
//! media root is the single on-disk directory containing all managed content;
//! every other path is derived from it.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::AppError;

const DEFAULT_PORT: u16 = 8081;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const DOWNLOAD_WORKERS: usize = 4;
const DOWNLOAD_POLL_INTERVAL_MS: u64 = 1000;
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
const DOWNLOAD_MAX_ATTEMPTS: i32 = 3;
const REFRESH_BATCH_SIZE: i64 = 100;

/// Default layout for archive files inside a domain directory. The
/// `%(download_year)s/` prefix variant places files in year subfolders.
pub const DEFAULT_ARCHIVE_FILE_FORMAT: &str = "%(download_datetime)s_%(title)s.%(ext)s";

/// Application configuration
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub media_directory: PathBuf,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub cors_origins: Vec<String>,
    // Download manager
    pub download_workers: usize,
    pub download_poll_interval_ms: u64,
    pub download_timeout_seconds: u64,
    pub download_max_attempts: i32,
    // External acquirer services (opaque HTTP boundaries)
    pub archive_service_url: String,
    pub video_service_url: String,
    // Refresh pipeline
    pub refresh_batch_size: i64,
    // Filename layout for newly archived pages
    pub archive_file_format: String,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// `DATABASE_URL` and `MEDIA_DIRECTORY` are required; the media directory
    /// must exist. Everything else has a default.
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Validation("DATABASE_URL must be set".to_string()))?;

        let media_directory = env::var("MEDIA_DIRECTORY")
            .map_err(|_| AppError::Validation("MEDIA_DIRECTORY must be set".to_string()))?;
        let media_directory = PathBuf::from(media_directory);
        if !media_directory.is_dir() {
            return Err(AppError::Validation(format!(
                "Media directory does not exist: {}",
                media_directory.display()
            )));
        }

        Ok(Self {
            database_url,
            server_host: env_or("ARCA_HOST", "0.0.0.0".to_string()),
            server_port: env_parse("ARCA_PORT", DEFAULT_PORT)?,
            media_directory,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            db_timeout_seconds: env_parse("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS)?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            download_workers: env_parse("DOWNLOAD_WORKERS", DOWNLOAD_WORKERS)?,
            download_poll_interval_ms: env_parse(
                "DOWNLOAD_POLL_INTERVAL_MS",
                DOWNLOAD_POLL_INTERVAL_MS,
            )?,
            download_timeout_seconds: env_parse("DOWNLOAD_TIMEOUT_SECONDS", DOWNLOAD_TIMEOUT_SECS)?,
            download_max_attempts: env_parse("DOWNLOAD_MAX_ATTEMPTS", DOWNLOAD_MAX_ATTEMPTS)?,
            archive_service_url: env_or("ARCHIVE_SERVICE_URL", "http://archive:8080".to_string()),
            video_service_url: env_or("VIDEO_SERVICE_URL", "http://video:8082".to_string()),
            refresh_batch_size: env_parse("REFRESH_BATCH_SIZE", REFRESH_BATCH_SIZE)?,
            archive_file_format: env_or(
                "ARCHIVE_FILE_FORMAT",
                DEFAULT_ARCHIVE_FILE_FORMAT.to_string(),
            ),
        })
    }

    /// Build a config rooted at the given media directory with defaults for
    /// everything else. Used by tests and tools.
    pub fn with_media_directory(media_directory: impl Into<PathBuf>) -> Self {
        Self {
            database_url: String::new(),
            server_host: "127.0.0.1".to_string(),
            server_port: DEFAULT_PORT,
            media_directory: media_directory.into(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            cors_origins: Vec::new(),
            download_workers: DOWNLOAD_WORKERS,
            download_poll_interval_ms: DOWNLOAD_POLL_INTERVAL_MS,
            download_timeout_seconds: DOWNLOAD_TIMEOUT_SECS,
            download_max_attempts: DOWNLOAD_MAX_ATTEMPTS,
            archive_service_url: "http://archive:8080".to_string(),
            video_service_url: "http://video:8082".to_string(),
            refresh_batch_size: REFRESH_BATCH_SIZE,
            archive_file_format: DEFAULT_ARCHIVE_FILE_FORMAT.to_string(),
        }
    }

    /// `<media>/archive` - domain directories live here.
    pub fn archive_directory(&self) -> PathBuf {
        self.media_directory.join("archive")
    }

    /// `<media>/videos` - channel directories live here.
    pub fn videos_directory(&self) -> PathBuf {
        self.media_directory.join("videos")
    }

    /// `<media>/config` - YAML config mirror files.
    pub fn config_directory(&self) -> PathBuf {
        self.media_directory.join("config")
    }

    /// Flag file indicating WROL mode. When present, persistent
    /// configuration changes are refused.
    pub fn wrol_mode_flag(&self) -> PathBuf {
        self.config_directory().join("wrol_mode")
    }

    pub fn is_wrol_mode(&self) -> bool {
        self.wrol_mode_flag().is_file()
    }

    /// Whether `path` is inside the media directory.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.media_directory)
    }

    /// Resolve a path relative to the media directory, refusing escapes.
    pub fn resolve_media_path(&self, path: &str) -> Result<PathBuf, AppError> {
        let candidate = Path::new(path);
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.media_directory.join(candidate)
        };
        if absolute
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(AppError::Validation(format!(
                "Path must not contain parent references: {}",
                path
            )));
        }
        if !self.contains(&absolute) {
            return Err(AppError::Validation(format!(
                "Path is outside the media directory: {}",
                path
            )));
        }
        Ok(absolute)
    }

    /// The path of `absolute` relative to the media directory, if inside it.
    pub fn relative_to_media(&self, absolute: &Path) -> Option<PathBuf> {
        absolute
            .strip_prefix(&self.media_directory)
            .ok()
            .map(Path::to_path_buf)
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| AppError::Validation(format!("Cannot parse {}: {}", key, value))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn media_layout_paths() {
        let media = TempDir::new().unwrap();
        let config = AppConfig::with_media_directory(media.path());
        assert_eq!(config.archive_directory(), media.path().join("archive"));
        assert_eq!(config.videos_directory(), media.path().join("videos"));
        assert_eq!(config.config_directory(), media.path().join("config"));
    }

    #[test]
    fn resolve_media_path_accepts_relative() {
        let media = TempDir::new().unwrap();
        let config = AppConfig::with_media_directory(media.path());
        let resolved = config.resolve_media_path("archive/example.com").unwrap();
        assert_eq!(resolved, media.path().join("archive/example.com"));
    }

    #[test]
    fn resolve_media_path_rejects_escape() {
        let media = TempDir::new().unwrap();
        let config = AppConfig::with_media_directory(media.path());
        assert!(config.resolve_media_path("../outside").is_err());
        assert!(config.resolve_media_path("/etc/passwd").is_err());
    }

    #[test]
    fn wrol_mode_follows_flag_file() {
        let media = TempDir::new().unwrap();
        let config = AppConfig::with_media_directory(media.path());
        assert!(!config.is_wrol_mode());

        std::fs::create_dir_all(config.config_directory()).unwrap();
        std::fs::write(config.wrol_mode_flag(), b"").unwrap();
        assert!(config.is_wrol_mode());
    }
}
