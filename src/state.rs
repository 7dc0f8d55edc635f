//! Application state management for the monitor.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the watch loop.

use lightsocks_monitor::{ConnectionStore, Snapshot, StreamReader};
use prometheus::{Gauge, Registry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::MonitorMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and the watch loop.
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ConnectionStore>,
    /// Reader for the `/api/connections` stream.
    pub reader: Arc<StreamReader<Snapshot>>,
    pub registry: Registry,
    pub metrics: MonitorMetrics,
    pub scrape_duration: Gauge,
    pub http_requests: AtomicU64,
    /// Monitor start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }
}
