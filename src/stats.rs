//! Runtime statistics for stream readers and the connection store.
//!
//! Counters are plain atomics so the transport task can record events without
//! taking any lock; the `/health` endpoint renders them as a plain-text table.

use serde::Serialize;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Event counters for one stream reader.
pub struct StreamStats {
    pub frames_received: AtomicU64,
    pub messages_delivered: AtomicU64,
    pub parse_errors: AtomicU64,
    pub transport_errors: AtomicU64,
    pub connects: AtomicU64,
    pub reconnects: AtomicU64,
    pub frame_bytes: Stat,
    last_message_at: Mutex<Option<Instant>>,
}

impl Default for StreamStats {
    fn default() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            connects: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            frame_bytes: Stat::default(),
            last_message_at: Mutex::new(None),
        }
    }
}

impl StreamStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_frame(&self, size_bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.frame_bytes.add_sample(size_bytes as f64);
    }

    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_message_at.lock() {
            *guard = Some(Instant::now());
        }
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self, is_reconnect: bool) {
        self.connects.fetch_add(1, Ordering::Relaxed);
        if is_reconnect {
            self.reconnects.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Seconds since the last delivered message, if any.
    pub fn seconds_since_last_message(&self) -> Option<f64> {
        self.last_message_at
            .lock()
            .ok()
            .and_then(|guard| guard.map(|t| t.elapsed().as_secs_f64()))
    }

    /// Takes a consistent-enough copy of the counters for reporting.
    pub fn snapshot(&self, buffer_len: usize, buffer_capacity: usize) -> StreamStatsSnapshot {
        let (_, avg_frame_bytes, max_frame_bytes, _, _) = self.frame_bytes.snapshot();
        StreamStatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            avg_frame_bytes,
            max_frame_bytes,
            buffer_len,
            buffer_capacity,
            seconds_since_last_message: self.seconds_since_last_message(),
        }
    }
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamStatsSnapshot {
    pub frames_received: u64,
    pub messages_delivered: u64,
    pub parse_errors: u64,
    pub transport_errors: u64,
    pub connects: u64,
    pub reconnects: u64,
    pub avg_frame_bytes: f64,
    pub max_frame_bytes: f64,
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    pub seconds_since_last_message: Option<f64>,
}

impl StreamStatsSnapshot {
    /// Buffer fill level in percent (0.0 to 100.0).
    pub fn buffer_fill_percent(&self) -> f64 {
        if self.buffer_capacity == 0 {
            return 0.0;
        }
        self.buffer_len as f64 / self.buffer_capacity as f64 * 100.0
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 14usize;
        let mut out = String::new();

        writeln!(out, "STREAM READER").ok();
        writeln!(out, "-------------").ok();

        let rows: [(&str, String); 9] = [
            ("frames_received", self.frames_received.to_string()),
            ("messages_delivered", self.messages_delivered.to_string()),
            ("parse_errors", self.parse_errors.to_string()),
            ("transport_errors", self.transport_errors.to_string()),
            ("connects", self.connects.to_string()),
            ("reconnects", self.reconnects.to_string()),
            ("avg_frame_size (B)", format!("{:.0}", self.avg_frame_bytes)),
            (
                "buffer_fill (%)",
                format!(
                    "{:.1} ({}/{})",
                    self.buffer_fill_percent(),
                    self.buffer_len,
                    self.buffer_capacity
                ),
            ),
            (
                "last_message (s ago)",
                self.seconds_since_last_message
                    .map(|s| format!("{:.1}", s))
                    .unwrap_or_else(|| "N/A".to_string()),
            ),
        ];

        for (name, value) in rows {
            writeln!(
                out,
                "{:left$} | {:>col$}",
                name,
                value,
                left = left_col,
                col = col_w
            )
            .ok();
        }
        out
    }
}
