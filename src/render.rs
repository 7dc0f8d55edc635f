//! Plain-text rendering of the connection table.
//!
//! Shared by the `watch` and `snapshot` commands and the `/` HTTP endpoint.

use chrono::{DateTime, Utc};
use lightsocks_monitor::{ConnectionsView, TrackedConnection};
use std::fmt::Write as FmtWrite;

const TRAFFIC_UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3600;
const SECONDS_PER_DAY: i64 = 86_400;

/// Formats a byte count with base-1024 units.
pub fn format_traffic(bytes: f64) -> String {
    if !bytes.is_finite() || bytes < 1024.0 {
        return format!("{} B", bytes.max(0.0).round() as u64);
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < TRAFFIC_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, TRAFFIC_UNITS[unit])
}

/// Speed cell: `-` when idle, otherwise the non-zero directions.
pub fn format_speed(upload: f64, download: f64) -> String {
    match (upload > 0.0, download > 0.0) {
        (false, false) => "-".to_string(),
        (true, true) => format!(
            "↑ {}/s ↓ {}/s",
            format_traffic(upload),
            format_traffic(download)
        ),
        (true, false) => format!("↑ {}/s", format_traffic(upload)),
        (false, true) => format!("↓ {}/s", format_traffic(download)),
    }
}

/// Compact age such as `42s`, `5m`, `3h` or `2d`.
pub fn format_age(seconds: i64) -> String {
    if seconds < SECONDS_PER_MINUTE {
        format!("{}s", seconds.max(0))
    } else if seconds < SECONDS_PER_HOUR {
        format!("{}m", seconds / SECONDS_PER_MINUTE)
    } else if seconds < SECONDS_PER_DAY {
        format!("{}h", seconds / SECONDS_PER_HOUR)
    } else {
        format!("{}d", seconds / SECONDS_PER_DAY)
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Which rows a table shows.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    /// Connection type, compared case-insensitively.
    pub kind: Option<String>,
    pub open_only: bool,
}

impl RowFilter {
    pub fn matches(&self, row: &TrackedConnection) -> bool {
        if self.open_only && row.completed {
            return false;
        }
        match &self.kind {
            Some(kind) => row.metadata.kind.eq_ignore_ascii_case(kind),
            None => true,
        }
    }
}

/// Renders the summary header and the connection table.
pub fn render_view(view: &ConnectionsView, filter: &RowFilter, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let (up_speed, down_speed) = view.total_speed();

    writeln!(out, "LIGHTSOCKS CONNECTIONS").ok();
    writeln!(out, "======================").ok();
    writeln!(
        out,
        "Upload total: {} | Download total: {} | Speed: {}",
        format_traffic(view.totals.upload_total as f64),
        format_traffic(view.totals.download_total as f64),
        format_speed(up_speed, down_speed)
    )
    .ok();
    writeln!(
        out,
        "Open: {} | Closed: {} | Keep closed: {} | Stream restarts: {}",
        view.open_count(),
        view.closed_count(),
        if view.keep_closed { "on" } else { "off" },
        view.stream_restarts
    )
    .ok();

    let types = view.type_counts();
    if !types.is_empty() {
        let summary: Vec<String> = types
            .iter()
            .map(|(kind, count)| {
                let kind = if kind.is_empty() { "?" } else { kind.as_str() };
                format!("{} ({})", kind, count)
            })
            .collect();
        writeln!(out, "Types: {}", summary.join(", ")).ok();
    }
    writeln!(out).ok();

    out.push_str(&render_rows(view.rows.iter().filter(|r| filter.matches(r)), now));
    out
}

/// Renders rows as a fixed-width table.
pub fn render_rows<'a>(
    rows: impl Iterator<Item = &'a TrackedConnection>,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{:8} | {:22} | {:5} | {:8} | {:30} | {:28} | {:>11} | {:>11} | {:>5} | {:6}",
        "ID", "Client", "Net", "Type", "Target", "Speed", "Upload", "Download", "Age", "State"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(162)).ok();

    let mut shown = 0usize;
    for row in rows {
        shown += 1;
        writeln!(
            out,
            "{:8} | {:22} | {:5} | {:8} | {:30} | {:28} | {:>11} | {:>11} | {:>5} | {:6}",
            truncate(&row.id, 8),
            truncate(&row.metadata.client, 22),
            row.metadata.network.to_uppercase(),
            truncate(&row.metadata.kind, 8),
            truncate(&row.metadata.target, 30),
            format_speed(row.upload_speed, row.download_speed),
            format_traffic(row.upload as f64),
            format_traffic(row.download as f64),
            format_age(row.age_seconds(now)),
            if row.completed { "closed" } else { "open" }
        )
        .ok();
    }

    if shown == 0 {
        writeln!(out, "(no connections)").ok();
    }
    out
}
