//! Wire types pushed by the proxy's control API.
//!
//! Field names follow the server's JSON (PascalCase). The server encodes nil
//! slices and nil endpoint pointers as `null`, so those fields decode `null`
//! as their default value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Decodes `null` (or a missing field, combined with `#[serde(default)]`) as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One point-in-time report of all connections known to the proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Process-wide cumulative bytes uploaded.
    #[serde(rename = "UploadTotal", default)]
    pub upload_total: u64,
    /// Process-wide cumulative bytes downloaded.
    #[serde(rename = "DownloadTotal", default)]
    pub download_total: u64,
    #[serde(rename = "Connections", default, deserialize_with = "null_as_default")]
    pub connections: Vec<RawConnection>,
}

/// A single connection as reported in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConnection {
    /// Connection identity. Optional on the wire so that a record without an
    /// ID can be skipped instead of failing the whole snapshot.
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(rename = "Metadata", default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
    #[serde(rename = "Upload", default)]
    pub upload: u64,
    #[serde(rename = "Download", default)]
    pub download: u64,
    #[serde(rename = "Start", default)]
    pub start: Option<DateTime<Utc>>,
}

impl RawConnection {
    /// Returns the ID if it is present and non-empty.
    pub fn valid_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Descriptive attributes of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "Network", default, deserialize_with = "null_as_default")]
    pub network: String,
    #[serde(rename = "Type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(rename = "Client", default, deserialize_with = "null_as_default")]
    pub client: String,
    #[serde(rename = "Source", default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(rename = "Target", default, deserialize_with = "null_as_default")]
    pub target: String,
}

impl Metadata {
    /// Overwrites fields with the non-empty fields of `other`.
    ///
    /// Returns true if anything changed.
    pub fn merge_from(&mut self, other: &Metadata) -> bool {
        let mut changed = false;
        for (mine, theirs) in [
            (&mut self.network, &other.network),
            (&mut self.kind, &other.kind),
            (&mut self.client, &other.client),
            (&mut self.source, &other.source),
            (&mut self.target, &other.target),
        ] {
            if !theirs.is_empty() && *mine != *theirs {
                mine.clone_from(theirs);
                changed = true;
            }
        }
        changed
    }
}

/// A log line pushed on the `/api/logs` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Level name as spelled by the server ("info", "warning", ...).
    #[serde(rename = "Type")]
    pub level: String,
    #[serde(rename = "Payload", default)]
    pub payload: String,
}

/// Response of `GET /api/version`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Version {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub build_time: String,
    #[serde(rename = "GO", default)]
    pub go: GoInfo,
    #[serde(default)]
    pub git: GitInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GoInfo {
    #[serde(rename = "OS", default)]
    pub os: String,
    #[serde(rename = "ARCH", default)]
    pub arch: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GitInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub commit: String,
}

/// Error body returned by the control API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(rename = "Code", default)]
    pub code: i64,
    #[serde(rename = "Msg", default)]
    pub msg: String,
}
