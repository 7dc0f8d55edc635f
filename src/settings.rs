//! Persisted user preferences.
//!
//! Settings live in a small JSON file and are loaded once at startup. Every
//! update is written back through a temporary file and an atomic rename.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::error::SettingsError;

/// User preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Keep closed connections in the table until cleared (default: true)
    #[serde(alias = "keepClosedConnections", alias = "keep_closed")]
    pub keep_closed_connections: bool,

    /// UI language, e.g. "en_US" or "zh_CN". None means system default.
    pub language: Option<String>,

    /// Level requested on the log stream (default: "info")
    #[serde(alias = "logLevel")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keep_closed_connections: true,
            language: None,
            log_level: "info".to_string(),
        }
    }
}

/// Shared, file-backed settings.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Settings::default(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                Settings::default()
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(settings),
        })
    }

    /// Like [`SettingsStore::load`], but falls back to defaults on error.
    ///
    /// The store keeps its path, so a later update overwrites the broken file.
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(path.clone()) {
            Ok(store) => store,
            Err(e) => {
                warn!("{}; continuing with default settings", e);
                Self {
                    path: Some(path),
                    current: RwLock::new(Settings::default()),
                }
            }
        }
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            current: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> Settings {
        self.current
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Applies `change` and persists the result.
    ///
    /// The in-memory value is updated even when persisting fails.
    pub fn update<F>(&self, change: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let updated = {
            let mut guard = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            change(&mut guard);
            guard.clone()
        };
        self.persist(&updated)?;
        Ok(updated)
    }

    fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source: std::io::Error| SettingsError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(settings).map_err(|source| {
            SettingsError::Parse {
                path: path.display().to_string(),
                source,
            }
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        debug!("Settings written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_closed() {
        let settings = Settings::default();
        assert!(settings.keep_closed_connections);
        assert_eq!(settings.log_level, "info");
        assert!(settings.language.is_none());
    }

    #[test]
    fn test_accepts_camel_case_keys() {
        let settings: Settings =
            serde_json::from_str(r#"{"keepClosedConnections": false, "logLevel": "debug"}"#)
                .unwrap();
        assert!(!settings.keep_closed_connections);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_in_memory_update() {
        let store = SettingsStore::in_memory(Settings::default());
        let updated = store
            .update(|s| s.language = Some("zh_CN".into()))
            .unwrap();
        assert_eq!(updated.language.as_deref(), Some("zh_CN"));
        assert_eq!(store.get().language.as_deref(), Some("zh_CN"));
        assert!(store.path().is_none());
    }
}
