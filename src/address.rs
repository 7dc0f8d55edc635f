//! Addresses of the proxy's control API.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ControlError;

/// Where the control API listens and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub secret: String,
    /// Use `https`/`wss` instead of `http`/`ws`.
    #[serde(default)]
    pub tls: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, secret: impl Into<String>, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secret: secret.into(),
            tls,
        }
    }

    fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn url(&self, scheme: &str, path: &str) -> Result<Url, ControlError> {
        Ok(Url::parse(&format!("{}://{}{}", scheme, self.authority(), path))?)
    }

    fn ws_scheme(&self) -> &'static str {
        if self.tls {
            "wss"
        } else {
            "ws"
        }
    }

    /// Base URL for REST calls, always ending in `/`.
    pub fn http_base(&self) -> Result<Url, ControlError> {
        self.url(if self.tls { "https" } else { "http" }, "/")
    }

    /// Stream address for connection snapshots.
    pub fn connections_url(&self, interval_ms: Option<u64>) -> Result<String, ControlError> {
        let mut url = self.url(self.ws_scheme(), "/api/connections")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", &self.secret);
            if let Some(interval) = interval_ms {
                query.append_pair("interval", &interval.to_string());
            }
        }
        Ok(url.into())
    }

    /// Stream address for log records at `level`.
    pub fn logs_url(&self, level: &str) -> Result<String, ControlError> {
        let mut url = self.url(self.ws_scheme(), "/api/logs")?;
        url.query_pairs_mut()
            .append_pair("level", level)
            .append_pair("token", &self.secret);
        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connections_url() {
        let endpoint = Endpoint::new("127.0.0.1", 9090, "s3cret", false);
        assert_eq!(
            endpoint.connections_url(None).unwrap(),
            "ws://127.0.0.1:9090/api/connections?token=s3cret"
        );
        assert_eq!(
            endpoint.connections_url(Some(500)).unwrap(),
            "ws://127.0.0.1:9090/api/connections?token=s3cret&interval=500"
        );
    }

    #[test]
    fn test_logs_url_uses_wss_with_tls() {
        let endpoint = Endpoint::new("proxy.local", 8443, "a&b", true);
        assert_eq!(
            endpoint.logs_url("debug").unwrap(),
            "wss://proxy.local:8443/api/logs?level=debug&token=a%26b"
        );
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let endpoint = Endpoint::new("::1", 9090, "", false);
        assert_eq!(endpoint.http_base().unwrap().as_str(), "http://[::1]:9090/");
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let endpoint = Endpoint::new("bad host", 9090, "", false);
        assert!(matches!(
            endpoint.http_base(),
            Err(ControlError::InvalidUrl(_))
        ));
    }
}
