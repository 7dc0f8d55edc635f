//! CLI arguments and subcommands for lightsocks-monitor.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// On/off switch for persisted preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(value: Switch) -> Self {
        value == Switch::On
    }
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "lightsocks-monitor",
    about = "Live connection monitor for lightsocks proxies",
    long_about = "Live connection monitor for lightsocks proxies.\n\n\
                  Streams connection snapshots from the proxy's control API, derives \
                  per-connection upload/download speed and lifecycle state, and shows \
                  them as a refreshing table, JSON endpoints and Prometheus metrics.",
    version = env!("CARGO_PKG_VERSION"),
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Control API host
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Control API port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Control API secret
    #[arg(short = 's', long)]
    pub secret: Option<String>,

    /// Use wss/https for the control API
    #[arg(long)]
    pub tls: bool,

    /// Snapshot push interval requested from the server (ms)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Number of recent messages kept by each stream reader
    #[arg(long)]
    pub buffer_length: Option<usize>,

    /// Settings file (JSON) for persisted preferences
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Terminal table refresh interval (ms)
    #[arg(long)]
    pub render_interval: Option<u64>,

    /// Serve /connections, /health and /metrics over HTTP while watching
    #[arg(long)]
    pub enable_http: bool,

    /// Bind the local HTTP server to a specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Local HTTP server port
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream connections and show a live table (default)
    Watch {
        /// Only show connections of this type (e.g. HTTP, Socks5)
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        /// Hide closed connections from the table
        #[arg(long)]
        open_only: bool,

        /// Print each view as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Do not render anything (useful with --enable-http)
        #[arg(long)]
        quiet: bool,
    },

    /// Stream proxy log records
    Logs {
        /// Log level requested from the server (default: persisted setting)
        #[arg(short = 'l', long)]
        level: Option<String>,
    },

    /// Close one connection
    Close {
        /// Connection ID
        id: String,
    },

    /// Close all connections
    CloseAll,

    /// Fetch one snapshot over REST and print it
    Snapshot {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show server and local version information
    Version,

    /// Show or edit persisted preferences
    Settings {
        /// Keep closed connections in the table
        #[arg(long, value_enum, conflicts_with = "toggle_keep_closed")]
        keep_closed: Option<Switch>,

        /// Flip the keep-closed preference
        #[arg(long)]
        toggle_keep_closed: bool,

        /// UI language (e.g. en_US, zh_CN)
        #[arg(long)]
        language: Option<String>,

        /// Level used by the logs command
        #[arg(long = "log-level")]
        stream_log_level: Option<String>,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments (YAML only)
        #[arg(long)]
        commented: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let args = Args::parse_from(["lightsocks-monitor", "--host", "10.0.0.1"]);
        assert!(args.command.is_none());
        assert_eq!(args.host.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_settings_switch_parses() {
        let args =
            Args::parse_from(["lightsocks-monitor", "settings", "--keep-closed", "off"]);
        match args.command {
            Some(Commands::Settings { keep_closed, .. }) => {
                assert_eq!(keep_closed, Some(Switch::Off));
                assert!(!bool::from(Switch::Off));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_close_takes_id() {
        let args = Args::parse_from(["lightsocks-monitor", "close", "abc-123"]);
        assert!(matches!(args.command, Some(Commands::Close { id }) if id == "abc-123"));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
