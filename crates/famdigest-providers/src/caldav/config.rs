//! CalDAV adapter configuration.

use std::time::Duration;

use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// Connection settings for one CalDAV account.
///
/// `server_url` points at the account's calendar home collection; the
/// password arrives already decrypted from the secret boundary.
#[derive(Debug, Clone)]
pub struct CalDavConfig {
    pub server_url: Url,
    pub username: String,
    pub password: String,
    /// Timeout applied to every HTTP call.
    pub timeout: Duration,
}

impl CalDavConfig {
    pub fn new(
        server_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> ProviderResult<Self> {
        let server_url = Url::parse(server_url).map_err(|e| {
            ProviderError::configuration(format!("invalid caldav server url: {e}"))
        })?;

        // Basic auth carries the raw password; refuse to send it in clear.
        if server_url.scheme() != "https" {
            return Err(ProviderError::configuration(
                "caldav server url must use https",
            ));
        }

        Ok(Self {
            server_url,
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
