//! Office 365 adapter configuration.

use std::time::Duration;

/// Scopes requested during authorization. `offline_access` yields the
/// refresh token the scheduler relies on.
pub const GRAPH_SCOPES: &str = "offline_access https://graph.microsoft.com/Calendars.Read";

/// OAuth application credentials and client settings for Microsoft Graph.
#[derive(Debug, Clone)]
pub struct Office365Config {
    /// Application (client) id from the Azure app registration.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Redirect URI registered for the authorization-code flow.
    pub redirect_uri: String,
    /// Directory tenant; "common" accepts any account.
    pub tenant: String,
    /// Timeout applied to every HTTP call.
    pub timeout: Duration,
}

impl Office365Config {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            tenant: "common".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("office365 client_id is empty".to_string());
        }
        if self.client_secret.is_empty() {
            return Err("office365 client_secret is empty".to_string());
        }
        if self.redirect_uri.is_empty() {
            return Err("office365 redirect_uri is empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_common_tenant() {
        let config = Office365Config::new("id", "secret", "uri");
        assert_eq!(config.tenant, "common");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_empty_fields() {
        let config = Office365Config::new("id", "", "uri");
        assert!(config.validate().is_err());
    }
}
