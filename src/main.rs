//! lightsocks-monitor
//!
//! Live connection monitor for lightsocks proxies with tracing logging.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod render;
mod state;

use clap::Parser;
use tracing::{info, Level};

use cli::{Args, Commands, LogLevel};
use commands::settings::SettingsChange;
use commands::{
    command_close, command_close_all, command_config, command_logs, command_settings,
    command_snapshot, command_version, command_watch, WatchOptions,
};
use config::{resolve_config, show_config, validate_effective_config, Config};
use render::RowFilter;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };
    let Some(log_level) = log_level else {
        return;
    };

    // Logs go to stderr so the table and JSON output stay clean
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match resolve_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = load_validated_config(&args)?;

        if args.check_config {
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Generating a default config must work even when the current one is broken
    if let Some(Commands::Config {
        output,
        format,
        commented,
    }) = &args.command
    {
        return command_config(output.clone(), format.clone(), *commented);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&args);

    match args.command {
        None => command_watch(config, WatchOptions::default()).await,

        Some(Commands::Watch {
            kind,
            open_only,
            json,
            quiet,
        }) => {
            let options = WatchOptions {
                filter: RowFilter { kind, open_only },
                json,
                quiet,
            };
            command_watch(config, options).await
        }

        Some(Commands::Logs { level }) => command_logs(config, level).await,

        Some(Commands::Close { id }) => command_close(&config, &id).await,

        Some(Commands::CloseAll) => command_close_all(&config).await,

        Some(Commands::Snapshot { json }) => command_snapshot(&config, json).await,

        Some(Commands::Version) => command_version(&config).await,

        Some(Commands::Settings {
            keep_closed,
            toggle_keep_closed,
            language,
            stream_log_level,
        }) => command_settings(
            &config,
            SettingsChange {
                keep_closed,
                toggle_keep_closed,
                language,
                log_level: stream_log_level,
            },
        ),

        Some(Commands::Config { .. }) => unreachable!("Config handled above"),
    }
}
