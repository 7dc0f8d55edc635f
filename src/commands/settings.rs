//! Settings command implementation.
//!
//! Shows the persisted preferences, or edits them when any option is given.

use lightsocks_monitor::{Settings, SettingsStore};
use std::fmt::Write as FmtWrite;
use std::path::Path;

use crate::cli::Switch;
use crate::config::Config;

/// Requested preference changes.
#[derive(Debug, Default)]
pub struct SettingsChange {
    pub keep_closed: Option<Switch>,
    pub toggle_keep_closed: bool,
    pub language: Option<String>,
    pub log_level: Option<String>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        self.keep_closed.is_none()
            && !self.toggle_keep_closed
            && self.language.is_none()
            && self.log_level.is_none()
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(keep) = self.keep_closed {
            settings.keep_closed_connections = keep.into();
        }
        if self.toggle_keep_closed {
            settings.keep_closed_connections = !settings.keep_closed_connections;
        }
        if let Some(language) = &self.language {
            // An empty value resets to the system default
            settings.language = Some(language.clone()).filter(|l| !l.is_empty());
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
    }
}

pub fn render_settings(settings: &Settings, path: Option<&Path>) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "Settings file: {}",
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(in memory)".to_string())
    )
    .ok();
    writeln!(
        out,
        "  keep_closed_connections: {}",
        settings.keep_closed_connections
    )
    .ok();
    writeln!(
        out,
        "  language:                {}",
        settings.language.as_deref().unwrap_or("(system default)")
    )
    .ok();
    writeln!(out, "  log_level:               {}", settings.log_level).ok();
    out
}

pub fn command_settings(
    config: &Config,
    change: SettingsChange,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = SettingsStore::load(config.settings_path())?;

    if change.is_empty() {
        print!("{}", render_settings(&store.get(), store.path()));
        return Ok(());
    }

    let updated = store.update(|s| change.apply(s))?;
    println!("✅ Settings updated");
    print!("{}", render_settings(&updated, store.path()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_change() {
        assert!(SettingsChange::default().is_empty());
    }

    #[test]
    fn test_apply_change() {
        let mut settings = Settings::default();
        let change = SettingsChange {
            toggle_keep_closed: true,
            language: Some("zh_CN".into()),
            log_level: Some("debug".into()),
            ..Default::default()
        };
        change.apply(&mut settings);
        assert!(!settings.keep_closed_connections);
        assert_eq!(settings.language.as_deref(), Some("zh_CN"));
        assert_eq!(settings.log_level, "debug");

        SettingsChange {
            language: Some(String::new()),
            keep_closed: Some(Switch::On),
            ..Default::default()
        }
        .apply(&mut settings);
        assert!(settings.language.is_none());
        assert!(settings.keep_closed_connections);
    }
}
