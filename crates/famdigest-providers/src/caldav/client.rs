//! HTTP client for CalDAV operations.
//!
//! Speaks the two WebDAV methods the adapter needs, PROPFIND and REPORT,
//! with Basic authentication on every request.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Method, Response, StatusCode};
use tracing::trace;

use crate::error::{ProviderError, ProviderResult};

use super::config::CalDavConfig;

/// HTTP client for CalDAV operations.
pub struct CalDavClient {
    http: reqwest::Client,
    config: CalDavConfig,
}

impl CalDavClient {
    pub fn new(config: CalDavConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { http, config })
    }

    /// Performs a PROPFIND request, used for calendar discovery.
    pub async fn propfind(&self, url: &str, body: &str, depth: u8) -> ProviderResult<String> {
        self.request("PROPFIND", url, body, depth).await
    }

    /// Performs a REPORT request, used for calendar-query.
    pub async fn report(&self, url: &str, body: &str) -> ProviderResult<String> {
        self.request("REPORT", url, body, 1).await
    }

    pub fn base_url(&self) -> &url::Url {
        &self.config.server_url
    }

    async fn request(&self, method: &str, url: &str, body: &str, depth: u8) -> ProviderResult<String> {
        let http_method = Method::from_bytes(method.as_bytes()).map_err(|_| {
            ProviderError::configuration(format!("invalid HTTP method: {method}"))
        })?;

        trace!(method = %method, url = %url, "sending caldav request");

        let response = self
            .http
            .request(http_method, url)
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", depth.to_string())
            .header("Authorization", self.basic_auth_header())
            .body(body.to_string())
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        self.handle_response(response).await
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.config.username, self.config.password);
        format!("Basic {}", BASE64.encode(credentials))
    }

    async fn handle_response(&self, response: Response) -> ProviderResult<String> {
        let status = response.status();
        trace!(status = %status, "received caldav response");

        match status {
            StatusCode::OK | StatusCode::MULTI_STATUS => response
                .text()
                .await
                .map_err(ProviderError::from_transport),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                ProviderError::authentication("invalid username or app password"),
            ),
            StatusCode::NOT_FOUND => Err(ProviderError::not_found(
                "calendar collection not found",
            )),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(ProviderError::rate_limited("too many requests to server"))
            }
            s if s.is_server_error() => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::unavailable(format!(
                    "server error ({s}): {body}"
                )))
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::invalid_response(format!(
                    "unexpected status {s}: {body}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> CalDavConfig {
        CalDavConfig::new("https://caldav.icloud.com/123/calendars/", "user", "pass")
            .unwrap()
            .with_timeout(Duration::from_secs(10))
    }

    #[test]
    fn client_creation() {
        assert!(CalDavClient::new(config()).is_ok());
    }

    #[test]
    fn basic_auth_header_encoding() {
        let client = CalDavClient::new(config()).unwrap();
        let header = client.basic_auth_header();
        assert_eq!(header, format!("Basic {}", BASE64.encode("user:pass")));
    }
}
