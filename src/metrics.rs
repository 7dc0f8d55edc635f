//! Prometheus metrics definitions for lightsocks-monitor.
//!
//! Gauges mirror the latest connection view and the stream reader counters.
//! They are refreshed right before every `/metrics` scrape.

use lightsocks_monitor::{ConnectionsView, StreamStatsSnapshot};
use prometheus::{Gauge, GaugeVec, Opts, Registry};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Collection of Prometheus metrics exported by the monitor.
#[derive(Clone)]
pub struct MonitorMetrics {
    // ========== Proxy Totals ==========
    pub upload_total_bytes: Gauge,
    pub download_total_bytes: Gauge,

    // ========== Connection Table ==========
    pub connections: GaugeVec, // labels: state (open/closed)
    pub connections_by_type: GaugeVec, // labels: type
    pub upload_speed_bytes: Gauge,
    pub download_speed_bytes: Gauge,
    pub stream_restarts: Gauge,

    // ========== Stream Reader ==========
    pub reader_frames_received: Gauge,
    pub reader_parse_errors: Gauge,
    pub reader_transport_errors: Gauge,
    pub reader_reconnects: Gauge,
    pub reader_buffered_messages: Gauge,

    // ========== Store ==========
    pub store_apply_duration_seconds: Gauge,
    pub store_revision: Gauge,

    /// Serializes view refreshes across concurrent scrapes.
    refresh: Arc<Mutex<()>>,
}

impl MonitorMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, Box<dyn std::error::Error>> {
        let upload_total_bytes = Gauge::new(
            "lightsocks_upload_total_bytes",
            "Cumulative bytes uploaded through the proxy",
        )?;
        let download_total_bytes = Gauge::new(
            "lightsocks_download_total_bytes",
            "Cumulative bytes downloaded through the proxy",
        )?;

        let connections = GaugeVec::new(
            Opts::new(
                "lightsocks_connections",
                "Connections in the monitor table by state",
            ),
            &["state"],
        )?;
        let connections_by_type = GaugeVec::new(
            Opts::new(
                "lightsocks_connections_by_type",
                "Connections in the monitor table by connection type",
            ),
            &["type"],
        )?;
        let upload_speed_bytes = Gauge::new(
            "lightsocks_upload_speed_bytes_per_second",
            "Summed upload speed of all tracked connections",
        )?;
        let download_speed_bytes = Gauge::new(
            "lightsocks_download_speed_bytes_per_second",
            "Summed download speed of all tracked connections",
        )?;
        let stream_restarts = Gauge::new(
            "lightsocks_monitor_stream_restarts",
            "Times the connection stream was re-established",
        )?;

        let reader_frames_received = Gauge::new(
            "lightsocks_monitor_reader_frames_received",
            "Frames received by the connection stream reader",
        )?;
        let reader_parse_errors = Gauge::new(
            "lightsocks_monitor_reader_parse_errors",
            "Frames dropped because they could not be parsed",
        )?;
        let reader_transport_errors = Gauge::new(
            "lightsocks_monitor_reader_transport_errors",
            "Transport failures of the connection stream reader",
        )?;
        let reader_reconnects = Gauge::new(
            "lightsocks_monitor_reader_reconnects",
            "Successful reconnects of the connection stream reader",
        )?;
        let reader_buffered_messages = Gauge::new(
            "lightsocks_monitor_reader_buffered_messages",
            "Messages currently retained in the reader buffer",
        )?;

        let store_apply_duration_seconds = Gauge::new(
            "lightsocks_monitor_store_apply_duration_seconds",
            "Time spent applying the last snapshot to the store",
        )?;
        let store_revision = Gauge::new(
            "lightsocks_monitor_store_revision",
            "Revision of the latest published connection view",
        )?;

        registry.register(Box::new(upload_total_bytes.clone()))?;
        registry.register(Box::new(download_total_bytes.clone()))?;
        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(connections_by_type.clone()))?;
        registry.register(Box::new(upload_speed_bytes.clone()))?;
        registry.register(Box::new(download_speed_bytes.clone()))?;
        registry.register(Box::new(stream_restarts.clone()))?;
        registry.register(Box::new(reader_frames_received.clone()))?;
        registry.register(Box::new(reader_parse_errors.clone()))?;
        registry.register(Box::new(reader_transport_errors.clone()))?;
        registry.register(Box::new(reader_reconnects.clone()))?;
        registry.register(Box::new(reader_buffered_messages.clone()))?;
        registry.register(Box::new(store_apply_duration_seconds.clone()))?;
        registry.register(Box::new(store_revision.clone()))?;

        Ok(Self {
            upload_total_bytes,
            download_total_bytes,
            connections,
            connections_by_type,
            upload_speed_bytes,
            download_speed_bytes,
            stream_restarts,
            reader_frames_received,
            reader_parse_errors,
            reader_transport_errors,
            reader_reconnects,
            reader_buffered_messages,
            store_apply_duration_seconds,
            store_revision,
            refresh: Arc::new(Mutex::new(())),
        })
    }

    /// Copies the current view into the table gauges.
    pub fn update_view(&self, view: &ConnectionsView) {
        let _guard = self
            .refresh
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.upload_total_bytes.set(view.totals.upload_total as f64);
        self.download_total_bytes
            .set(view.totals.download_total as f64);

        self.connections
            .with_label_values(&["open"])
            .set(view.open_count() as f64);
        self.connections
            .with_label_values(&["closed"])
            .set(view.closed_count() as f64);

        // Types come and go; drop stale label sets
        self.connections_by_type.reset();
        let mut by_label: BTreeMap<String, usize> = BTreeMap::new();
        for (kind, count) in view.type_counts() {
            let label = if kind.is_empty() { "unknown".to_string() } else { kind };
            *by_label.entry(label).or_insert(0) += count;
        }
        for (label, count) in &by_label {
            self.connections_by_type
                .with_label_values(&[label.as_str()])
                .set(*count as f64);
        }

        let (up, down) = view.total_speed();
        self.upload_speed_bytes.set(up);
        self.download_speed_bytes.set(down);
        self.stream_restarts.set(view.stream_restarts as f64);
        self.store_revision.set(view.revision as f64);
    }

    pub fn update_reader(&self, stats: &StreamStatsSnapshot) {
        self.reader_frames_received
            .set(stats.frames_received as f64);
        self.reader_parse_errors.set(stats.parse_errors as f64);
        self.reader_transport_errors
            .set(stats.transport_errors as f64);
        self.reader_reconnects.set(stats.reconnects as f64);
        self.reader_buffered_messages.set(stats.buffer_len as f64);
    }

    /// `last_ms` is the duration of the latest store apply in milliseconds.
    pub fn update_store_timing(&self, last_ms: f64) {
        self.store_apply_duration_seconds.set(last_ms / 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightsocks_monitor::{Metadata, Totals, TrackedConnection};
    use chrono::Utc;

    fn row(id: &str, kind: &str, completed: bool) -> TrackedConnection {
        let now = Utc::now();
        TrackedConnection {
            id: id.into(),
            metadata: Metadata {
                kind: kind.into(),
                ..Default::default()
            },
            start: None,
            upload: 0,
            download: 0,
            previous_upload: 0,
            previous_download: 0,
            upload_speed: 10.0,
            download_speed: 20.0,
            completed,
            first_seen_at: now,
            last_seen_at: now,
            closed_at: None,
        }
    }

    #[test]
    fn test_update_view_sets_gauges() {
        let registry = Registry::new();
        let metrics = MonitorMetrics::new(&registry).unwrap();

        let view = ConnectionsView {
            rows: vec![row("a", "HTTP", false), row("b", "", true)],
            totals: Totals {
                upload_total: 100,
                download_total: 200,
            },
            keep_closed: true,
            revision: 3,
            stream_restarts: 1,
            updated_at: None,
        };
        metrics.update_view(&view);

        assert_eq!(metrics.download_total_bytes.get(), 200.0);
        assert_eq!(metrics.connections.with_label_values(&["open"]).get(), 1.0);
        assert_eq!(metrics.connections.with_label_values(&["closed"]).get(), 1.0);
        assert_eq!(
            metrics
                .connections_by_type
                .with_label_values(&["unknown"])
                .get(),
            1.0
        );
        assert_eq!(metrics.upload_speed_bytes.get(), 20.0);
        assert_eq!(metrics.store_revision.get(), 3.0);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        MonitorMetrics::new(&registry).unwrap();
        assert!(MonitorMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_concurrent_refreshes_do_not_double_count() {
        let registry = Registry::new();
        let metrics = MonitorMetrics::new(&registry).unwrap();
        let view = ConnectionsView {
            rows: vec![
                row("a", "HTTP", false),
                row("b", "HTTP", false),
                row("c", "Socks5", true),
            ],
            ..Default::default()
        };

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        metrics.update_view(&view);
                    }
                });
            }
        });

        let by_type = &metrics.connections_by_type;
        assert_eq!(by_type.with_label_values(&["HTTP"]).get(), 2.0);
        assert_eq!(by_type.with_label_values(&["Socks5"]).get(), 1.0);
    }
}
