//! Google adapter configuration.

use std::time::Duration;

/// The calendar scope requested during authorization.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// OAuth application credentials and client settings for Google.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client id of the web application.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered for the authorization-code flow.
    pub redirect_uri: String,
    /// Timeout applied to every HTTP call.
    pub timeout: Duration,
}

impl GoogleConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that required fields are present.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("google client_id is empty".to_string());
        }
        if self.client_secret.is_empty() {
            return Err("google client_secret is empty".to_string());
        }
        if self.redirect_uri.is_empty() {
            return Err("google redirect_uri is empty".to_string());
        }
        Ok(())
    }
}
