//! Integration tests for persisted settings.

use lightsocks_monitor::{Settings, SettingsError, SettingsStore};
use std::fs;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::load(dir.path().join("settings.json")).unwrap();
    assert_eq!(store.get(), Settings::default());
    assert!(store.get().keep_closed_connections);
}

#[test]
fn test_update_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    let store = SettingsStore::load(&path).unwrap();
    store
        .update(|s| {
            s.keep_closed_connections = false;
            s.language = Some("zh_CN".to_string());
        })
        .unwrap();
    assert!(path.exists());

    let reloaded = SettingsStore::load(&path).unwrap().get();
    assert!(!reloaded.keep_closed_connections);
    assert_eq!(reloaded.language.as_deref(), Some("zh_CN"));
    assert_eq!(reloaded.log_level, "info");
}

#[test]
fn test_reads_camel_case_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, r#"{"keepClosedConnections": false, "logLevel": "debug"}"#).unwrap();

    let settings = SettingsStore::load(&path).unwrap().get();
    assert!(!settings.keep_closed_connections);
    assert_eq!(settings.log_level, "debug");
}

#[test]
fn test_broken_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, "{ not json").unwrap();

    let err = SettingsStore::load(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }));

    // Fallback keeps the path so the next update repairs the file
    let store = SettingsStore::load_or_default(&path);
    assert_eq!(store.get(), Settings::default());
    store.update(|s| s.log_level = "warn".to_string()).unwrap();
    assert_eq!(SettingsStore::load(&path).unwrap().get().log_level, "warn");
}
