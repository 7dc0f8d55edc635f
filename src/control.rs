//! Thin client for the proxy's REST control plane.
//!
//! Closing connections never touches local state; the closure shows up on the
//! next snapshot pushed over the stream.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::address::Endpoint;
use crate::error::ControlError;
use crate::model::{ApiError, Snapshot, Version};

#[derive(Debug, Clone)]
pub struct ControlClient {
    http: Client,
    base: Url,
}

impl ControlClient {
    pub fn new(endpoint: &Endpoint, timeout: Duration) -> Result<Self, ControlError> {
        let mut headers = HeaderMap::new();
        if !endpoint.secret.is_empty() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", endpoint.secret))
                .map_err(|_| ControlError::InvalidSecret)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base: endpoint.http_base()?,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ControlError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ControlError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response, ControlError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiError>(&body) {
            Ok(err) if !err.msg.is_empty() => err.msg,
            _ if !body.trim().is_empty() => body.trim().to_string(),
            _ => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        Err(ControlError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// `DELETE /api/connections/{id}`
    #[instrument(skip(self))]
    pub async fn close_connection(&self, id: &str) -> Result<(), ControlError> {
        let url = self.url(&["api", "connections", id])?;
        debug!("Closing connection via {}", url);
        Self::check(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    /// `DELETE /api/connections`
    #[instrument(skip(self))]
    pub async fn close_all_connections(&self) -> Result<(), ControlError> {
        let url = self.url(&["api", "connections"])?;
        debug!("Closing all connections via {}", url);
        Self::check(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    /// `GET /api/connections`
    #[instrument(skip(self))]
    pub async fn get_connections(&self) -> Result<Snapshot, ControlError> {
        let url = self.url(&["api", "connections"])?;
        let response = Self::check(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    /// `GET /api/version`
    #[instrument(skip(self))]
    pub async fn get_version(&self) -> Result<Version, ControlError> {
        let url = self.url(&["api", "version"])?;
        let response = Self::check(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ControlClient {
        ControlClient::new(
            &Endpoint::new("127.0.0.1", 9090, "secret", false),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_urls_are_built_from_segments() {
        let client = client();
        assert_eq!(
            client.url(&["api", "version"]).unwrap().as_str(),
            "http://127.0.0.1:9090/api/version"
        );
        assert_eq!(
            client.url(&["api", "connections", "a/b c"]).unwrap().as_str(),
            "http://127.0.0.1:9090/api/connections/a%2Fb%20c"
        );
    }

    #[test]
    fn test_secret_with_newline_is_rejected() {
        let result = ControlClient::new(
            &Endpoint::new("127.0.0.1", 9090, "bad\nsecret", false),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(ControlError::InvalidSecret)));
    }
}
