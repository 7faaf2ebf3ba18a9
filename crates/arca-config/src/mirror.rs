//! Shared mirror machinery: file IO, version tracking, the import driver,
//! and switch registration for debounced background dumps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use arca_core::{AppConfig, AppError, EventBus, RuntimeFlags};
use arca_db::ConfigVersionRepository;
use arca_worker::SwitchBus;

/// One mirrored config file: YAML -> DB and DB -> YAML.
#[async_trait]
pub trait ConfigMirror: Send + Sync {
    /// Version-tracking key ("tags", "download_manager", ...).
    fn name(&self) -> &'static str;

    fn file_name(&self) -> &'static str;

    /// Apply the file to the DB. A missing file or empty top-level list
    /// must not delete DB rows; a present, non-empty list is the source of
    /// truth and removes rows it omits.
    async fn import_config(&self) -> Result<(), AppError>;

    /// Write DB state to the file, bumping the version.
    async fn dump_config(&self) -> Result<(), AppError>;
}

/// Read and parse a config file. `None` when the file does not exist.
pub fn read_config_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::ConfigFile(format!("Cannot read {}: {}", path.display(), e)))?;
    let parsed = serde_yaml::from_str(&contents)
        .map_err(|e| AppError::ConfigFile(format!("Cannot parse {}: {}", path.display(), e)))?;
    Ok(Some(parsed))
}

/// Write a config file, creating the config directory first.
pub fn write_config_file<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_yaml::to_string(value)
        .map_err(|e| AppError::ConfigFile(format!("Cannot serialize {}: {}", path.display(), e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Remove a stale config file, ignoring a missing one.
pub fn remove_config_file(path: &Path) -> Result<(), AppError> {
    if path.is_file() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct VersionOnly {
    #[serde(default)]
    version: i32,
}

/// Compute the next version for a dump: the on-disk version (or the
/// DB-known one when the file is gone) validated against the DB and
/// advanced by one. Fresh dumps start at 1.
pub async fn next_version(
    versions: &ConfigVersionRepository,
    name: &str,
    path: &Path,
) -> Result<i32, AppError> {
    let incoming = match read_config_file::<VersionOnly>(path)? {
        Some(doc) => doc.version,
        None => versions.get(name).await?,
    };
    versions.bump(name, incoming).await
}

/// Refuse persistent config writes while WROL mode is active.
pub fn check_wrol_mode(config: &AppConfig, flags: &RuntimeFlags) -> Result<(), AppError> {
    if flags.is_wrol_mode() || config.is_wrol_mode() {
        return Err(AppError::WrolMode(
            "Config files cannot be saved while WROL mode is enabled".to_string(),
        ));
    }
    Ok(())
}

/// The ordered set of mirrors plus the shared import driver.
pub struct ConfigMirrors {
    mirrors: Vec<Arc<dyn ConfigMirror>>,
    events: EventBus,
    flags: RuntimeFlags,
}

impl ConfigMirrors {
    /// `mirrors` must be in dependency order: tags before downloads before
    /// channels before domains before inventories.
    pub fn new(mirrors: Vec<Arc<dyn ConfigMirror>>, events: EventBus, flags: RuntimeFlags) -> Self {
        Self {
            mirrors,
            events,
            flags,
        }
    }

    pub fn mirrors(&self) -> &[Arc<dyn ConfigMirror>] {
        &self.mirrors
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ConfigMirror>> {
        self.mirrors.iter().find(|m| m.name() == name).cloned()
    }

    /// Import every config in order. A failing config is reported in the
    /// result map and does not abort the rest. Once all imports ran the
    /// download flags are released so no download starts before configs
    /// finished loading.
    pub async fn import_all_configs(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for mirror in &self.mirrors {
            let name = mirror.name().to_string();
            match mirror.import_config().await {
                Ok(()) => {
                    tracing::info!(config = %name, "Config imported");
                    results.insert(name, true);
                }
                Err(e) => {
                    let message = format!("Failed to import {} config: {}", name, e);
                    tracing::error!(config = %name, error = %e, "Config import failed");
                    self.events.send_config_import_failed(&message);
                    results.insert(name, false);
                }
            }
        }

        self.flags.enable_downloads();
        results
    }

    /// Dump every config. Used by backup tooling; normal saves go through
    /// the background switches.
    pub async fn dump_all_configs(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for mirror in &self.mirrors {
            let name = mirror.name().to_string();
            match mirror.dump_config().await {
                Ok(()) => {
                    results.insert(name, true);
                }
                Err(e) => {
                    tracing::error!(config = %name, error = %e, "Config dump failed");
                    self.events
                        .send_config_save_failed(&format!("Failed to save {} config: {}", name, e));
                    results.insert(name, false);
                }
            }
        }
        results
    }
}

/// The switch name whose activation dumps the given config in the
/// background.
pub fn save_switch_name(config_name: &str) -> String {
    format!("save_{}_config", config_name)
}

/// Register one debounced background-dump switch per mirror. The switch
/// worker is the only YAML writer.
pub fn register_config_switches(bus: &SwitchBus, mirrors: &[Arc<dyn ConfigMirror>]) {
    for mirror in mirrors {
        let mirror = mirror.clone();
        bus.register(&save_switch_name(mirror.name()), move |_context| {
            let mirror = mirror.clone();
            async move {
                mirror.dump_config().await?;
                Ok(())
            }
        });
    }
}

/// The absolute path of a mirror's file under the media config directory.
pub fn config_path(config: &AppConfig, file_name: &str) -> PathBuf {
    config.config_directory().join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        version: i32,
        tags: Vec<String>,
    }

    #[test]
    fn missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tags.yaml");
        let doc: Option<Doc> = read_config_file(&path).unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn round_trips_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config/tags.yaml");
        let doc = Doc {
            version: 3,
            tags: vec!["news".to_string()],
        };
        write_config_file(&path, &doc).unwrap();
        let read: Doc = read_config_file(&path).unwrap().unwrap();
        assert_eq!(read, doc);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tags.yaml");
        std::fs::write(&path, "version: [unclosed").unwrap();
        let result: Result<Option<Doc>, _> = read_config_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tags.yaml");
        remove_config_file(&path).unwrap();
        std::fs::write(&path, "x").unwrap();
        remove_config_file(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn switch_names() {
        assert_eq!(save_switch_name("domains"), "save_domains_config");
        assert_eq!(
            save_switch_name("download_manager"),
            "save_download_manager_config"
        );
    }
}
