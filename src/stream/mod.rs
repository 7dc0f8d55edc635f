//! Reconnecting, bounded-buffer event stream.
//!
//! A [`StreamReader`] keeps one logical subscription to a server-pushed
//! message stream, re-opening the transport with backoff whenever it drops,
//! and fans parsed messages out to any number of subscribers.

pub mod backoff;
pub mod reader;
pub mod registry;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use backoff::Backoff;
pub use reader::StreamReader;
pub use registry::{EventKind, StreamEvent, SubscriptionId};
pub use transport::{Frame, FrameStream, Transport, WebSocketTransport};

/// Tuning for a stream reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Number of recent messages retained (default: 200, 0 disables)
    #[serde(default = "default_buffer_length")]
    pub buffer_length: usize,

    /// First reconnect delay in milliseconds (default: 1000)
    #[serde(default = "default_min_retry_interval_ms")]
    pub min_retry_interval_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds (default: 30000)
    #[serde(default = "default_max_retry_interval_ms")]
    pub max_retry_interval_ms: u64,
}

fn default_buffer_length() -> usize {
    200
}
fn default_min_retry_interval_ms() -> u64 {
    1000
}
fn default_max_retry_interval_ms() -> u64 {
    30_000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_length: default_buffer_length(),
            min_retry_interval_ms: default_min_retry_interval_ms(),
            max_retry_interval_ms: default_max_retry_interval_ms(),
        }
    }
}

impl StreamConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.min_retry_interval_ms),
            Duration::from_millis(self.max_retry_interval_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.buffer_length, 200);
        assert_eq!(config.min_retry_interval_ms, 1000);
        assert_eq!(config.max_retry_interval_ms, 30_000);
    }

    #[test]
    fn test_stream_config_partial_yaml() {
        let config: StreamConfig = serde_yaml::from_str("buffer_length: 50").unwrap();
        assert_eq!(config.buffer_length, 50);
        assert_eq!(config.min_retry_interval_ms, 1000);
    }
}
