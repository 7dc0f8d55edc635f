//! HTTP endpoint handlers for the monitor.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Plain-text connection table
//! - `/connections`: Current view as JSON
//! - `/connections/{id}`: One row as JSON
//! - `/connections/closed` (DELETE): Clear closed rows
//! - `/keep-closed` (POST): Toggle retention of closed rows
//! - `/health`: Stream and store health
//! - `/metrics`: Prometheus metrics endpoint

pub mod connections;
pub mod health;
pub mod metrics;
pub mod root;

// Re-export handlers
pub use connections::{
    clear_closed_handler, connection_handler, connections_handler, toggle_keep_closed_handler,
};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
