use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::executor::DEFAULT_SHELL;
use crate::backend::notifier::Category;

const DEFAULT_ENTRIES: &str = include_str!("../data/entries.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Defaults to `~/.entries.json`.
    pub entries_file: Option<PathBuf>,
    pub detection_interval_ms: u64,
    pub spawn_tick_ms: u64,
    pub shell: String,
    pub log_file: Option<PathBuf>,
    pub notification_cond: Vec<Category>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entries_file: None,
            detection_interval_ms: 5000,
            spawn_tick_ms: 50,
            shell: DEFAULT_SHELL.into(),
            log_file: None,
            notification_cond: Category::ALL.to_vec(),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&settings_path())
    }

    /// Missing or unreadable settings fall back to the defaults.
    pub fn load_from(path: &Path) -> Self {
        if let Ok(data) = fs::read_to_string(path) {
            serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings in {}: {}", path.display(), e);
                Settings::default()
            })
        } else {
            Settings::default()
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(path, data).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }

    pub fn entries_path(&self) -> PathBuf {
        self.entries_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".entries.json")
        })
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms.max(1))
    }

    pub fn spawn_tick(&self) -> Duration {
        Duration::from_millis(self.spawn_tick_ms.max(1))
    }
}

pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("quick-toggler")
        .join("settings.json")
}

/// Write the bundled entries document to `path` if nothing is there yet, and
/// return the path with symlinks resolved.
pub fn ensure_entries_file(path: &Path) -> Result<PathBuf, String> {
    if !path.exists() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }
        fs::write(path, DEFAULT_ENTRIES)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        log::info!("Created default entries file at {}", path.display());
    }
    fs::canonicalize(path).map_err(|e| format!("Failed to resolve {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "detection_interval_ms": 250, "notification_cond": ["ext"] }"#)
            .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.detection_interval(), Duration::from_millis(250));
        assert_eq!(settings.notification_cond, vec![Category::Ext]);
        assert_eq!(settings.spawn_tick_ms, 50);
        assert_eq!(settings.shell, "/bin/sh");
    }

    #[test]
    fn invalid_or_missing_settings_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load_from(&dir.path().join("nope.json")), Settings::default());

        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            entries_file: Some(dir.path().join("entries.json")),
            spawn_tick_ms: 0,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.spawn_tick(), Duration::from_millis(1));
        assert_eq!(loaded.entries_path(), dir.path().join("entries.json"));
    }

    #[test]
    fn default_entries_file_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.json");

        let resolved = ensure_entries_file(&path).unwrap();
        let bundled = fs::read_to_string(&resolved).unwrap();
        assert_eq!(bundled, DEFAULT_ENTRIES);

        fs::write(&path, r#"{ "entries": [] }"#).unwrap();
        ensure_entries_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{ "entries": [] }"#);
    }

    #[test]
    fn symlinked_entries_file_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.json");
        fs::write(&real, r#"{ "entries": [] }"#).unwrap();
        let link = dir.path().join("link.json");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert_eq!(ensure_entries_file(&link).unwrap(), fs::canonicalize(&real).unwrap());
    }
}
