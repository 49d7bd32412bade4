//! Process configuration.
//!
//! This module is the only place the environment is read. Everything
//! downstream receives explicit config structs and constructed
//! collaborators.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use famdigest_compose::PromptEndpointConfig;
use famdigest_delivery::{SmtpConfig, TwilioConfig};
use famdigest_providers::google::GoogleConfig;
use famdigest_providers::office365::Office365Config;
use thiserror::Error;

/// Configuration errors raised at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {detail}")]
    Invalid { var: &'static str, detail: String },
}

/// Everything the server process needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_path: String,
    /// Base64-encoded 32-byte key for the secret boundary.
    pub secret_key: String,
    pub twilio: TwilioConfig,
    pub smtp: SmtpConfig,
    pub summarizer: PromptEndpointConfig,
    /// Absent when the provider is not configured for this deployment.
    pub google: Option<GoogleConfig>,
    pub office365: Option<Office365Config>,
    /// Where OAuth callbacks redirect on success.
    pub oauth_success_url: String,
    /// Where OAuth callbacks redirect on failure; receives
    /// `?error=provider|message`.
    pub oauth_error_url: String,
    /// Timeout applied to outbound provider calls.
    pub http_timeout: Duration,
}

impl ServerConfig {
    /// Builds the config from `FAMDIGEST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = optional("FAMDIGEST_BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e| ConfigError::Invalid {
                var: "FAMDIGEST_BIND_ADDR",
                detail: format!("{e}"),
            })?;

        let http_timeout = match optional("FAMDIGEST_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|e| ConfigError::Invalid {
                var: "FAMDIGEST_HTTP_TIMEOUT_SECS",
                detail: format!("{e}"),
            })?),
            None => Duration::from_secs(30),
        };

        let twilio = TwilioConfig::new(
            required("FAMDIGEST_TWILIO_ACCOUNT_SID")?,
            required("FAMDIGEST_TWILIO_AUTH_TOKEN")?,
            required("FAMDIGEST_TWILIO_FROM_NUMBER")?,
        )
        .with_timeout(http_timeout);

        let smtp = SmtpConfig::new(
            required("FAMDIGEST_SMTP_HOST")?,
            required("FAMDIGEST_SMTP_USERNAME")?,
            required("FAMDIGEST_SMTP_PASSWORD")?,
            required("FAMDIGEST_SMTP_FROM")?,
        );

        let summarizer = PromptEndpointConfig::new(
            required("FAMDIGEST_SUMMARIZER_URL")?,
            required("FAMDIGEST_SUMMARIZER_API_KEY")?,
        )
        .with_timeout(http_timeout.max(Duration::from_secs(60)));

        let google = match optional("FAMDIGEST_GOOGLE_CLIENT_ID") {
            Some(client_id) => Some(
                GoogleConfig::new(
                    client_id,
                    required("FAMDIGEST_GOOGLE_CLIENT_SECRET")?,
                    required("FAMDIGEST_GOOGLE_REDIRECT_URI")?,
                )
                .with_timeout(http_timeout),
            ),
            None => None,
        };

        let office365 = match optional("FAMDIGEST_OFFICE365_CLIENT_ID") {
            Some(client_id) => Some(
                Office365Config::new(
                    client_id,
                    required("FAMDIGEST_OFFICE365_CLIENT_SECRET")?,
                    required("FAMDIGEST_OFFICE365_REDIRECT_URI")?,
                )
                .with_timeout(http_timeout),
            ),
            None => None,
        };

        Ok(Self {
            bind_addr,
            database_path: optional("FAMDIGEST_DATABASE_PATH")
                .unwrap_or_else(|| "famdigest.db".to_string()),
            secret_key: required("FAMDIGEST_SECRET_KEY")?,
            twilio,
            smtp,
            summarizer,
            google,
            office365,
            oauth_success_url: optional("FAMDIGEST_OAUTH_SUCCESS_URL")
                .unwrap_or_else(|| "/settings/calendars".to_string()),
            oauth_error_url: optional("FAMDIGEST_OAUTH_ERROR_URL")
                .unwrap_or_else(|| "/settings/calendars/error".to_string()),
            http_timeout,
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::Missing(var))
}

fn optional(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.is_empty())
}
