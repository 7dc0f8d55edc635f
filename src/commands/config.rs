//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Json => "lightsocks-monitor.json",
            ConfigFormat::Toml => "lightsocks-monitor.toml",
            ConfigFormat::Yaml => "lightsocks-monitor.yaml",
        }),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Lightsocks Monitor Configuration
# ================================
#
# Control API
# -----------
# host: "127.0.0.1"            # Proxy control API host
# port: 9090                   # Proxy control API port
# secret: null                 # API secret (sent as token / Bearer)
# tls: false                   # Use wss:// and https://
# snapshot_interval_ms: null   # Push interval requested from the server (null = server default)
# request_timeout_secs: 10     # Timeout for REST calls
#
# Preferences
# -----------
# settings_file: null          # JSON settings file (null = ~/.config/lightsocks-monitor/settings.json)
#
# Terminal
# --------
# render_interval_ms: 1000     # Table refresh interval
#
# Local HTTP Server
# -----------------
# enable_http: false           # Serve /, /connections, /health, /metrics
# bind: "127.0.0.1"            # Bind IP
# listen_port: 9216            # HTTP port
#
# Stream Readers
# --------------
# stream:
#   buffer_length: 200         # Recent messages kept per reader (0 = none)
#   min_retry_interval_ms: 1000
#   max_retry_interval_ms: 30000
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_loadable_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();

        let loaded = crate::config::load_config(Some(&path)).unwrap();
        assert_eq!(loaded.port, Config::default().port);
        assert_eq!(loaded.stream.buffer_length, 200);
    }

    #[test]
    fn test_writes_loadable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        command_config(Some(path.clone()), ConfigFormat::Toml, false).unwrap();

        let loaded = crate::config::load_config(Some(&path)).unwrap();
        assert_eq!(loaded.host, Config::default().host);
    }
}
