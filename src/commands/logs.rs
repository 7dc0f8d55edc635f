//! Logs command implementation.
//!
//! Streams log records from the proxy and prints one line per record.

use chrono::Local;
use lightsocks_monitor::{EventKind, LogRecord, SettingsStore, StreamEvent, StreamReader};
use tracing::{info, instrument, warn};

use crate::commands::shutdown_signal;
use crate::config::Config;

/// Levels the proxy accepts on `/api/logs`.
const LOG_LEVELS: [&str; 8] = [
    "trace", "debug", "info", "warn", "warning", "error", "fatal", "panic",
];

pub fn format_record(record: &LogRecord, timestamp: &str) -> String {
    format!(
        "{} {:7} {}",
        timestamp,
        record.level.to_uppercase(),
        record.payload
    )
}

/// Streams log records until SIGINT/SIGTERM.
#[instrument(skip(config))]
pub async fn command_logs(
    config: Config,
    level: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let level = match level {
        Some(level) => level,
        None => SettingsStore::load_or_default(config.settings_path())
            .get()
            .log_level,
    };
    if !LOG_LEVELS.contains(&level.as_str()) {
        warn!(
            "Log level '{}' is not one of {:?}, the server will fall back to info",
            level, LOG_LEVELS
        );
    }

    let endpoint = config.endpoint();
    let address = endpoint.logs_url(&level)?;

    let reader: StreamReader<LogRecord> = StreamReader::new("logs", config.stream.clone());
    reader.on_data(|record| {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        println!("{}", format_record(record, &timestamp));
    });
    reader.subscribe(EventKind::Error, |event| {
        if let StreamEvent::Error(e) = event {
            eprintln!("⚠️  {}", e);
        }
    });

    info!(
        "Streaming '{}' logs from {}:{}",
        level, endpoint.host, endpoint.port
    );
    reader.connect(&address);

    shutdown_signal().await;
    reader.destroy();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_record() {
        let record = LogRecord {
            level: "warning".into(),
            payload: "dial tcp: i/o timeout".into(),
        };
        assert_eq!(
            format_record(&record, "12:00:00"),
            "12:00:00 WARNING dial tcp: i/o timeout"
        );
    }
}
