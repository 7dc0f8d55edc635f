//! CLI command implementations for lightsocks-monitor.
//!
//! This module provides implementations for all CLI subcommands:
//! - `watch`: Live connection table (default)
//! - `logs`: Proxy log stream
//! - `close`, `close-all`, `snapshot`, `version`: Control API calls
//! - `settings`: Persisted preferences
//! - `config`: Configuration file generation

pub mod config;
pub mod control;
pub mod logs;
pub mod settings;
pub mod watch;

use tokio::signal;
use tracing::{error, info};

// Re-export command functions
pub use config::command_config;
pub use control::{command_close, command_close_all, command_snapshot, command_version};
pub use logs::command_logs;
pub use settings::command_settings;
pub use watch::{command_watch, WatchOptions};

/// Resolves once SIGINT or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
