//! Reactive connection store.
//!
//! [`ConnectionStore`] wraps the aggregator, applies the retention policy for
//! closed rows and publishes an immutable [`ConnectionsView`] on a
//! `tokio::sync::watch` channel after every change.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::aggregator::{ApplyOutcome, SnapshotAggregator, Totals, TrackedConnection};
use crate::model::Snapshot;
use crate::settings::SettingsStore;
use crate::stats::Stat;

/// Immutable state of the table at one revision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionsView {
    pub rows: Vec<TrackedConnection>,
    pub totals: Totals,
    pub keep_closed: bool,
    /// Incremented on every published change.
    pub revision: u64,
    /// Number of times the upstream stream was re-established.
    pub stream_restarts: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConnectionsView {
    pub fn find(&self, id: &str) -> Option<&TrackedConnection> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn open_count(&self) -> usize {
        self.rows.iter().filter(|row| !row.completed).count()
    }

    pub fn closed_count(&self) -> usize {
        self.rows.iter().filter(|row| row.completed).count()
    }

    /// Summed `(upload, download)` speed of all rows in bytes per second.
    pub fn total_speed(&self) -> (f64, f64) {
        self.rows.iter().fold((0.0, 0.0), |(up, down), row| {
            (up + row.upload_speed, down + row.download_speed)
        })
    }

    /// Number of rows per connection type, sorted by type name.
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.metadata.kind.clone()).or_insert(0) += 1;
        }
        counts
    }
}

struct StoreState {
    aggregator: SnapshotAggregator,
    keep_closed: bool,
    revision: u64,
    stream_restarts: u64,
    /// Set by a restart notification, cleared by the next feed.
    restart_pending: bool,
    updated_at: Option<DateTime<Utc>>,
}

impl StoreState {
    fn view(&self) -> ConnectionsView {
        ConnectionsView {
            rows: self.aggregator.rows().cloned().collect(),
            totals: self.aggregator.totals(),
            keep_closed: self.keep_closed,
            revision: self.revision,
            stream_restarts: self.stream_restarts,
            updated_at: self.updated_at,
        }
    }
}

pub struct ConnectionStore {
    state: Mutex<StoreState>,
    settings: Arc<SettingsStore>,
    sender: watch::Sender<Arc<ConnectionsView>>,
    apply_ms: Stat,
}

impl ConnectionStore {
    /// Creates a store whose retention flag comes from `settings`.
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let keep_closed = settings.get().keep_closed_connections;
        let state = StoreState {
            aggregator: SnapshotAggregator::new(),
            keep_closed,
            revision: 0,
            stream_restarts: 0,
            restart_pending: false,
            updated_at: None,
        };
        let (sender, _) = watch::channel(Arc::new(state.view()));
        debug!("Connection store created (keep_closed={})", keep_closed);

        Self {
            state: Mutex::new(state),
            settings,
            sender,
            apply_ms: Stat::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &mut StoreState) {
        state.revision += 1;
        self.sender.send_replace(Arc::new(state.view()));
    }

    /// Applies a snapshot received now.
    pub fn feed(&self, snapshot: &Snapshot) -> ApplyOutcome {
        self.feed_at(snapshot, Utc::now())
    }

    /// Applies a snapshot received at `now`, then the retention policy.
    pub fn feed_at(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> ApplyOutcome {
        let started = Instant::now();
        let mut state = self.lock();

        let outcome = state.aggregator.apply_at(snapshot, now);

        if state.restart_pending {
            state.restart_pending = false;
            if !outcome.completed.is_empty() {
                info!(
                    "{} connections closed right after a stream restart; some may have closed during the gap",
                    outcome.completed.len()
                );
            }
        }

        if !state.keep_closed && !outcome.completed.is_empty() {
            let dropped = state.aggregator.evict_completed();
            debug!("Dropped {} closed connections (retention off)", dropped);
        }

        state.updated_at = Some(now);
        self.publish(&mut state);
        drop(state);

        self.apply_ms
            .add_sample(started.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    /// Flips the retention flag and returns the new value.
    pub fn toggle_save(&self) -> bool {
        let mut state = self.lock();
        let keep = !state.keep_closed;
        self.apply_retention(&mut state, keep);
        keep
    }

    /// Turning retention off purges closed rows at once; turning it back on
    /// does not bring them back.
    pub fn set_retention(&self, keep_closed: bool) {
        let mut state = self.lock();
        self.apply_retention(&mut state, keep_closed);
    }

    /// Changes the flag and persists it under the caller's state lock, so the
    /// settings file always matches the last published view.
    fn apply_retention(&self, state: &mut StoreState, keep_closed: bool) {
        state.keep_closed = keep_closed;
        if !keep_closed {
            let dropped = state.aggregator.evict_completed();
            if dropped > 0 {
                info!("Cleared {} closed connections", dropped);
            }
        }
        self.publish(state);

        if let Err(e) = self
            .settings
            .update(|s| s.keep_closed_connections = keep_closed)
        {
            warn!("Failed to persist retention setting: {}", e);
        }
    }

    /// Removes closed rows without changing the retention flag.
    pub fn clear_closed(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.aggregator.evict_completed();
        if dropped > 0 {
            self.publish(&mut state);
        }
        dropped
    }

    /// Records that the upstream stream was re-established.
    pub fn note_stream_restart(&self) {
        let mut state = self.lock();
        state.stream_restarts += 1;
        state.restart_pending = true;
        info!(
            "Connection stream restarted ({} so far)",
            state.stream_restarts
        );
        self.publish(&mut state);
    }

    pub fn keep_closed(&self) -> bool {
        self.lock().keep_closed
    }

    /// Latest published view.
    pub fn view(&self) -> Arc<ConnectionsView> {
        Arc::clone(&self.sender.borrow())
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ConnectionsView>> {
        self.sender.subscribe()
    }

    pub fn find(&self, id: &str) -> Option<TrackedConnection> {
        self.view().find(id).cloned()
    }

    /// Timing of `feed` calls in milliseconds as `(last, avg, max, min, count)`.
    pub fn apply_stats(&self) -> (f64, f64, f64, f64, u64) {
        self.apply_ms.snapshot()
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawConnection;
    use crate::settings::Settings;

    fn store(keep_closed: bool) -> ConnectionStore {
        ConnectionStore::new(Arc::new(SettingsStore::in_memory(Settings {
            keep_closed_connections: keep_closed,
            ..Settings::default()
        })))
    }

    fn snapshot(ids: &[&str]) -> Snapshot {
        Snapshot {
            upload_total: 10,
            download_total: 20,
            connections: ids
                .iter()
                .map(|id| RawConnection {
                    id: Some(id.to_string()),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_initial_view_is_empty() {
        let store = store(true);
        let view = store.view();
        assert!(view.rows.is_empty());
        assert_eq!(view.revision, 0);
        assert!(view.keep_closed);
    }

    #[test]
    fn test_feed_publishes_new_revision() {
        let store = store(true);
        let mut rx = store.subscribe();
        store.feed(&snapshot(&["a"]));

        assert!(rx.has_changed().unwrap());
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.revision, 1);
        assert_eq!(view.totals.download_total, 20);
        assert!(store.find("a").is_some());
    }

    #[test]
    fn test_stream_restart_is_counted() {
        let store = store(true);
        store.note_stream_restart();
        store.note_stream_restart();
        assert_eq!(store.view().stream_restarts, 2);
    }

    #[test]
    fn test_clear_closed_keeps_flag() {
        let store = store(true);
        store.feed(&snapshot(&["a", "b"]));
        store.feed(&snapshot(&["b"]));
        assert_eq!(store.clear_closed(), 1);
        assert!(store.keep_closed());
        assert_eq!(store.view().rows.len(), 1);
    }

    #[test]
    fn test_type_counts() {
        let store = store(true);
        let mut snap = snapshot(&["a", "b", "c"]);
        snap.connections[0].metadata.kind = "HTTP".into();
        snap.connections[1].metadata.kind = "Socks5".into();
        snap.connections[2].metadata.kind = "HTTP".into();
        store.feed(&snap);

        let counts = store.view().type_counts();
        assert_eq!(counts.get("HTTP"), Some(&2));
        assert_eq!(counts.get("Socks5"), Some(&1));
    }
}
