//! Error types shared across the monitor library.
//!
//! Only [`ControlError`] and [`SettingsError`] ever reach a caller; stream and
//! record errors are handled where they occur (reconnect or skip) and only
//! surface as diagnostics.

use thiserror::Error;

/// Errors raised while reading the telemetry stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    /// Connect failure or abnormal close. Triggers a reconnect.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame that could not be decoded into the stream's message type.
    #[error("failed to parse frame: {0}")]
    Parse(String),
}

/// A malformed record inside an otherwise valid snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("connection record at index {index} has no ID")]
    MissingId { index: usize },
}

/// Failures of control-plane requests.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid control API address: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid secret for authorization header")]
    InvalidSecret,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("control API returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Failures loading or persisting user settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
