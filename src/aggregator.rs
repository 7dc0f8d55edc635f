//! Snapshot aggregation.
//!
//! The proxy reports *cumulative* byte counters for every live connection.
//! [`SnapshotAggregator`] turns a sequence of those snapshots into one row per
//! connection ID with derived per-second throughput and a closed flag.
//!
//! Rows keep first-seen order. A row is never removed for staleness; only
//! [`SnapshotAggregator::evict`] and [`SnapshotAggregator::evict_completed`]
//! drop rows.

use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::RecordError;
use crate::model::{Metadata, RawConnection, Snapshot};

/// Process-wide totals copied from the latest snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub upload_total: u64,
    pub download_total: u64,
}

/// One row of the connection table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedConnection {
    pub id: String,
    pub metadata: Metadata,
    pub start: Option<DateTime<Utc>>,
    pub upload: u64,
    pub download: u64,
    pub previous_upload: u64,
    pub previous_download: u64,
    /// Bytes per second over the last observed interval.
    pub upload_speed: f64,
    pub download_speed: f64,
    pub completed: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// When the connection was first found missing.
    pub closed_at: Option<DateTime<Utc>>,
}

impl TrackedConnection {
    fn open(id: String, raw: &RawConnection, now: DateTime<Utc>) -> Self {
        Self {
            id,
            metadata: raw.metadata.clone(),
            start: raw.start,
            upload: raw.upload,
            download: raw.download,
            previous_upload: raw.upload,
            previous_download: raw.download,
            upload_speed: 0.0,
            download_speed: 0.0,
            completed: false,
            first_seen_at: now,
            last_seen_at: now,
            closed_at: None,
        }
    }

    fn observe(&mut self, raw: &RawConnection, now: DateTime<Utc>) {
        let elapsed = (now - self.last_seen_at)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or(0.0);

        self.previous_upload = self.upload;
        self.previous_download = self.download;
        self.upload = raw.upload;
        self.download = raw.download;

        if elapsed > 0.0 {
            self.upload_speed = self.upload.saturating_sub(self.previous_upload) as f64 / elapsed;
            self.download_speed =
                self.download.saturating_sub(self.previous_download) as f64 / elapsed;
        } else {
            self.upload_speed = 0.0;
            self.download_speed = 0.0;
        }

        self.last_seen_at = now;
        if self.start.is_none() {
            self.start = raw.start;
        }
        self.metadata.merge_from(&raw.metadata);
    }

    fn close(&mut self, now: DateTime<Utc>) {
        self.completed = true;
        self.upload_speed = 0.0;
        self.download_speed = 0.0;
        self.closed_at = Some(now);
    }

    /// Age of the connection relative to `now`, from its reported start time
    /// or from when it was first seen.
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        let since = self.start.unwrap_or(self.first_seen_at);
        (now - since).num_seconds().max(0)
    }
}

/// What a single [`SnapshotAggregator::apply_at`] call changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    /// IDs seen for the first time, in snapshot order.
    pub created: Vec<String>,
    /// IDs that closed during this cycle.
    pub completed: Vec<String>,
    /// Completed IDs the server listed again. They stay closed.
    pub reappeared: Vec<String>,
    /// Records that were ignored.
    pub skipped: Vec<RecordError>,
}

#[derive(Debug, Default)]
pub struct SnapshotAggregator {
    rows: AHashMap<String, TrackedConnection>,
    order: Vec<String>,
    totals: Totals,
    cycles: u64,
}

impl SnapshotAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one snapshot observed now.
    pub fn apply(&mut self, snapshot: &Snapshot) -> ApplyOutcome {
        self.apply_at(snapshot, Utc::now())
    }

    /// Applies one snapshot observed at `now`.
    pub fn apply_at(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        self.cycles += 1;
        self.totals = Totals {
            upload_total: snapshot.upload_total,
            download_total: snapshot.download_total,
        };

        let mut seen_ids: AHashSet<&str> = AHashSet::with_capacity(snapshot.connections.len());

        for (index, raw) in snapshot.connections.iter().enumerate() {
            let Some(id) = raw.valid_id() else {
                let err = RecordError::MissingId { index };
                warn!("Skipping connection record: {}", err);
                outcome.skipped.push(err);
                continue;
            };

            if !seen_ids.insert(id) {
                debug!("Connection {} listed twice in one snapshot, ignoring repeat", id);
                continue;
            }

            match self.rows.get_mut(id) {
                Some(row) if row.completed => {
                    warn!("Closed connection {} reported again, keeping it closed", id);
                    outcome.reappeared.push(id.to_string());
                }
                Some(row) => row.observe(raw, now),
                None => {
                    let id = id.to_string();
                    self.rows
                        .insert(id.clone(), TrackedConnection::open(id.clone(), raw, now));
                    self.order.push(id.clone());
                    outcome.created.push(id);
                }
            }
        }

        for id in &self.order {
            if seen_ids.contains(id.as_str()) {
                continue;
            }
            if let Some(row) = self.rows.get_mut(id) {
                if !row.completed {
                    row.close(now);
                    outcome.completed.push(id.clone());
                }
            }
        }

        debug!(
            "Applied snapshot #{}: {} rows, {} new, {} closed, {} skipped",
            self.cycles,
            self.order.len(),
            outcome.created.len(),
            outcome.completed.len(),
            outcome.skipped.len()
        );
        outcome
    }

    /// Rows in first-seen order.
    pub fn rows(&self) -> impl Iterator<Item = &TrackedConnection> + '_ {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&TrackedConnection> {
        self.rows.get(id)
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of snapshots applied so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn evict(&mut self, id: &str) -> Option<TrackedConnection> {
        let row = self.rows.remove(id)?;
        self.order.retain(|other| other != id);
        Some(row)
    }

    /// Drops every completed row. Returns how many were dropped.
    pub fn evict_completed(&mut self) -> usize {
        let before = self.order.len();
        self.rows.retain(|_, row| !row.completed);
        let rows = &self.rows;
        self.order.retain(|id| rows.contains_key(id));
        before - self.order.len()
    }
}
