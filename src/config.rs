//! Configuration management for lightsocks-monitor.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use lightsocks_monitor::{Endpoint, StreamConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_API_PORT: u16 = 9090;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_LISTEN_PORT: u16 = 9216;
pub const DEFAULT_RENDER_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SETTINGS_FILE: &str = "lightsocks-monitor-settings.json";
pub const MAX_BUFFER_LENGTH: usize = 100_000;

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Control API
    pub host: Option<String>,
    #[serde(alias = "api_port", alias = "api-port")]
    pub port: Option<u16>,
    pub secret: Option<String>,
    pub tls: Option<bool>,
    /// Push interval requested from the server; None keeps the server default
    #[serde(alias = "interval", alias = "snapshot-interval-ms")]
    pub snapshot_interval_ms: Option<u64>,
    #[serde(alias = "request-timeout-secs")]
    pub request_timeout_secs: Option<u64>,

    // Preferences
    #[serde(alias = "settings-file")]
    pub settings_file: Option<PathBuf>,

    // Terminal rendering
    #[serde(alias = "render-interval-ms")]
    pub render_interval_ms: Option<u64>,

    // Local HTTP server
    #[serde(alias = "enable-http")]
    pub enable_http: Option<bool>,
    pub bind: Option<String>,
    #[serde(alias = "listen-port")]
    pub listen_port: Option<u16>,

    // Stream readers
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Some(DEFAULT_HOST.to_string()),
            port: Some(DEFAULT_API_PORT),
            secret: None,
            tls: Some(false),
            snapshot_interval_ms: None,
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            settings_file: None,
            render_interval_ms: Some(DEFAULT_RENDER_INTERVAL_MS),
            enable_http: Some(false),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            listen_port: Some(DEFAULT_LISTEN_PORT),
            stream: StreamConfig::default(),
        }
    }
}

impl Config {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(
            self.host.as_deref().unwrap_or(DEFAULT_HOST),
            self.port.unwrap_or(DEFAULT_API_PORT),
            self.secret.as_deref().unwrap_or_default(),
            self.tls.unwrap_or(false),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.unwrap_or(DEFAULT_RENDER_INTERVAL_MS))
    }

    /// Settings file path; defaults to `~/.config/lightsocks-monitor/settings.json`.
    pub fn settings_path(&self) -> PathBuf {
        if let Some(path) = &self.settings_file {
            return path.clone();
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home)
                .join(".config")
                .join("lightsocks-monitor")
                .join("settings.json"),
            None => PathBuf::from(DEFAULT_SETTINGS_FILE),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.host.as_deref().is_some_and(|h| h.trim().is_empty()) {
        return Err("host must not be empty".into());
    }

    if cfg.port == Some(0) {
        return Err("port must be between 1 and 65535".into());
    }

    if let Some(secret) = cfg.secret.as_deref() {
        if secret.chars().any(|c| c.is_control()) {
            return Err("secret must not contain control characters".into());
        }
    }

    if cfg.snapshot_interval_ms == Some(0) {
        return Err("snapshot_interval_ms must be greater than 0".into());
    }

    if cfg.request_timeout_secs == Some(0) {
        return Err("request_timeout_secs must be greater than 0".into());
    }

    if cfg.render_interval_ms == Some(0) {
        return Err("render_interval_ms must be greater than 0".into());
    }

    let stream = &cfg.stream;
    if stream.buffer_length > MAX_BUFFER_LENGTH {
        return Err(format!(
            "stream.buffer_length {} exceeds the maximum of {}",
            stream.buffer_length, MAX_BUFFER_LENGTH
        )
        .into());
    }
    if stream.min_retry_interval_ms > stream.max_retry_interval_ms {
        return Err(format!(
            "stream.min_retry_interval_ms ({}) is greater than stream.max_retry_interval_ms ({})",
            stream.min_retry_interval_ms, stream.max_retry_interval_ms
        )
        .into());
    }

    if cfg.enable_http.unwrap_or(false) {
        if cfg.listen_port == Some(0) {
            return Err("listen_port must be between 1 and 65535".into());
        }
        let bind = cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        if bind.parse::<IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    // Catches hosts the URL parser rejects (spaces, bad IPv6 literals)
    cfg.endpoint().http_base()?;

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(host) = &args.host {
        config.host = Some(host.clone());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(secret) = &args.secret {
        config.secret = Some(secret.clone());
    }
    if args.tls {
        config.tls = Some(true);
    }
    if let Some(interval) = args.interval {
        config.snapshot_interval_ms = Some(interval);
    }
    if let Some(buffer_length) = args.buffer_length {
        config.stream.buffer_length = buffer_length;
    }
    if let Some(path) = &args.settings_file {
        config.settings_file = Some(path.clone());
    }
    if let Some(render_interval) = args.render_interval {
        config.render_interval_ms = Some(render_interval);
    }

    // Local HTTP server
    if args.enable_http {
        config.enable_http = Some(true);
    }
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(listen_port) = args.listen_port {
        config.listen_port = Some(listen_port);
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support.
///
/// An explicit path must exist; without one the default locations are tried
/// and built-in defaults are used if none is present.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/lightsocks-monitor/monitor.yaml",
                "/etc/lightsocks-monitor/monitor.yml",
                "/etc/lightsocks-monitor/monitor.json",
                "./lightsocks-monitor.yaml",
                "./lightsocks-monitor.yml",
                "./lightsocks-monitor.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    // Never echo the secret
    let mut redacted = config.clone();
    if redacted.secret.as_deref().is_some_and(|s| !s.is_empty()) {
        redacted.secret = Some("********".to_string());
    }
    println!("{}", render_config(&redacted, &format)?);
    Ok(())
}
