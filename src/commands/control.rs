//! Control API commands: close, close-all, snapshot, version.

use chrono::Utc;
use lightsocks_monitor::{ConnectionsView, ControlClient, SnapshotAggregator, Version};
use std::fmt::Write as FmtWrite;
use tracing::instrument;

use crate::config::Config;
use crate::render::{format_traffic, render_rows};

fn client(config: &Config) -> Result<ControlClient, Box<dyn std::error::Error>> {
    Ok(ControlClient::new(&config.endpoint(), config.request_timeout())?)
}

/// Closes one connection. The table picks up the closure from the stream.
#[instrument(skip(config))]
pub async fn command_close(config: &Config, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    client(config)?.close_connection(id).await?;
    println!("✅ Close requested for connection {}", id);
    Ok(())
}

#[instrument(skip(config))]
pub async fn command_close_all(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    client(config)?.close_all_connections().await?;
    println!("✅ Close requested for all connections");
    Ok(())
}

/// Fetches one snapshot and prints it as a table or raw JSON.
#[instrument(skip(config))]
pub async fn command_snapshot(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = client(config)?.get_connections().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let mut aggregator = SnapshotAggregator::new();
    let outcome = aggregator.apply(&snapshot);
    let view = ConnectionsView {
        rows: aggregator.rows().cloned().collect(),
        totals: aggregator.totals(),
        ..Default::default()
    };

    println!(
        "Upload total: {} | Download total: {} | Connections: {}",
        format_traffic(view.totals.upload_total as f64),
        format_traffic(view.totals.download_total as f64),
        view.rows.len()
    );
    if !outcome.skipped.is_empty() {
        println!("Skipped {} records without an ID", outcome.skipped.len());
    }
    println!();
    print!("{}", render_rows(view.rows.iter(), Utc::now()));
    Ok(())
}

pub fn render_version(server: Option<&Version>) -> String {
    let mut out = String::new();
    writeln!(out, "lightsocks-monitor {}", env!("CARGO_PKG_VERSION")).ok();
    writeln!(out, "  built: {}", env!("VERGEN_BUILD_TIMESTAMP")).ok();

    match server {
        Some(v) => {
            writeln!(out, "{} {}", v.name, v.version).ok();
            writeln!(out, "  built: {}", v.build_time).ok();
            writeln!(out, "  go:    {} {}/{}", v.go.version, v.go.os, v.go.arch).ok();
            writeln!(out, "  git:   {} ({} @ {})", v.git.url, v.git.branch, v.git.commit).ok();
        }
        None => {
            writeln!(out, "server: unavailable").ok();
        }
    }
    out
}

/// Prints local build info and the server's version.
#[instrument(skip(config))]
pub async fn command_version(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match client(config)?.get_version().await {
        Ok(version) => {
            print!("{}", render_version(Some(&version)));
            Ok(())
        }
        Err(e) => {
            print!("{}", render_version(None));
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_version_without_server() {
        let out = render_version(None);
        assert!(out.contains("lightsocks-monitor"));
        assert!(out.contains("server: unavailable"));
    }

    #[test]
    fn test_render_version_with_server() {
        let mut version = Version::default();
        version.name = "lightsocks".into();
        version.version = "v1.0.0".into();
        version.go.os = "linux".into();
        let out = render_version(Some(&version));
        assert!(out.contains("lightsocks v1.0.0"));
        assert!(out.contains("/linux") || out.contains("linux/"));
    }
}
