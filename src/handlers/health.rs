//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that reports stream
//! reader statistics and store activity as plain text.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use std::sync::atomic::Ordering;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

pub fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");
    state.record_http_request();

    let view = state.store.view();
    let stats = state.reader.stats();

    // Healthy once the first snapshot has been applied
    let (status, message) = if view.updated_at.is_some() {
        (StatusCode::OK, "OK")
    } else if state.reader.is_active() {
        (StatusCode::SERVICE_UNAVAILABLE, "Waiting for first snapshot")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Stream reader stopped")
    };

    // The stream address carries the secret; show host and port only
    let endpoint = state.config.endpoint();
    let uptime_str = format_uptime(state.start_time.elapsed().as_secs());
    let (last_ms, avg_ms, max_ms, _, applied) = state.store.apply_stats();

    let mut store_section = String::new();
    writeln!(store_section, "CONNECTION STORE").ok();
    writeln!(store_section, "----------------").ok();
    writeln!(store_section, "{:26} | {:>14}", "snapshots_applied", applied).ok();
    writeln!(
        store_section,
        "{:26} | {:>14}",
        "apply_ms (last/avg/max)",
        format!("{:.2}/{:.2}/{:.2}", last_ms, avg_ms, max_ms)
    )
    .ok();
    writeln!(store_section, "{:26} | {:>14}", "revision", view.revision).ok();
    writeln!(store_section, "{:26} | {:>14}", "open_connections", view.open_count()).ok();
    writeln!(store_section, "{:26} | {:>14}", "closed_connections", view.closed_count()).ok();
    writeln!(store_section, "{:26} | {:>14}", "stream_restarts", view.stream_restarts).ok();
    writeln!(
        store_section,
        "{:26} | {:>14}",
        "http_requests",
        state.http_requests.load(Ordering::Relaxed)
    )
    .ok();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nStream: {} ({}:{}, {})\n\n{}\n{store_section}",
            state.reader.name(),
            endpoint.host,
            endpoint.port,
            if state.reader.is_active() { "active" } else { "stopped" },
            stats.render_table()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(90), "1.5 minutes");
        assert_eq!(format_uptime(2 * 3600), "2.0 hours");
        assert_eq!(format_uptime(3 * 86_400), "3.0 days");
    }
}
