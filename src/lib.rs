//! Lightsocks Monitor Library
//!
//! Real-time telemetry ingestion for a lightsocks proxy. The library turns the
//! proxy's pushed stream of cumulative connection snapshots into a live table
//! of per-connection throughput and lifecycle state.
//!
//! # Features
//!
//! - **Resilient Streams**: WebSocket reader with backoff reconnects and a bounded message buffer
//! - **Snapshot Aggregation**: Per-connection upload/download speed from cumulative counters
//! - **Retention Policy**: Optionally keep closed connections visible until cleared
//! - **Reactive Views**: Immutable table views published on a `tokio::sync::watch` channel
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lightsocks_monitor::{ConnectionStore, Endpoint, SettingsStore, Snapshot, StreamConfig, StreamReader};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = Endpoint::new("127.0.0.1", 9090, "secret", false);
//! let settings = Arc::new(SettingsStore::load_or_default("settings.json"));
//! let store = Arc::new(ConnectionStore::new(settings));
//!
//! let reader: StreamReader<Snapshot> = StreamReader::new("connections", StreamConfig::default());
//! let sink = Arc::clone(&store);
//! reader.on_data(move |snapshot| {
//!     sink.feed(snapshot);
//! });
//! reader.connect(&endpoint.connections_url(None)?);
//!
//! let mut views = store.subscribe();
//! while views.changed().await.is_ok() {
//!     let view = views.borrow_and_update().clone();
//!     println!("{} open, {} closed", view.open_count(), view.closed_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod aggregator;
pub mod control;
pub mod error;
pub mod model;
pub mod ringbuffer;
pub mod settings;
pub mod stats;
pub mod store;
pub mod stream;

// Re-export main types for convenience
pub use address::Endpoint;
pub use aggregator::{ApplyOutcome, SnapshotAggregator, Totals, TrackedConnection};
pub use control::ControlClient;
pub use error::{ControlError, RecordError, SettingsError, StreamError};
pub use model::{LogRecord, Metadata, RawConnection, Snapshot, Version};
pub use ringbuffer::Ringbuffer;
pub use settings::{Settings, SettingsStore};
pub use stats::{StreamStats, StreamStatsSnapshot};
pub use store::{ConnectionStore, ConnectionsView};
pub use stream::{EventKind, StreamConfig, StreamEvent, StreamReader, SubscriptionId};
