//! Account-to-adapter dispatch: the remote calendar service.
//!
//! Selection is a pure exhaustive match over the closed [`CalendarKind`]
//! enum; an unknown provider is unrepresentable at compile time, and a
//! connection missing the credentials its provider needs is a
//! configuration error, never a silent no-op.

use std::time::Duration;

use famdigest_core::CalendarKind;

use crate::caldav::{CalDavConfig, CalDavSource};
use crate::error::{ProviderError, ProviderResult};
use crate::google::{GoogleConfig, GoogleSource};
use crate::office365::{Office365Config, Office365Source};
use crate::source::CalendarSource;

/// The credentials of one connection, as handed over by the caller.
///
/// Tokens and the CalDAV password arrive in the clear; decryption happens
/// at the secret boundary before dispatch, never inside adapters.
#[derive(Debug, Clone)]
pub struct ProviderAccount {
    pub kind: CalendarKind,
    /// The account email, used in logs and owner-facing messages.
    pub email: String,
    /// OAuth access token (google, office365).
    pub access_token: Option<String>,
    /// OAuth refresh token (google, office365).
    pub refresh_token: Option<String>,
    /// App-specific password (apple), already decrypted.
    pub password: Option<String>,
    /// Calendar home URL (apple).
    pub server_url: Option<String>,
}

/// Anything that can turn a connection's credentials into a
/// [`CalendarSource`].
///
/// The digest pipeline depends on this trait rather than on
/// [`RemoteCalendars`] directly, so tests can substitute scripted sources.
pub trait SourceFactory: Send + Sync {
    fn source_for(&self, account: &ProviderAccount) -> ProviderResult<Box<dyn CalendarSource>>;
}

/// Builds provider adapters for connection records.
///
/// Holds the OAuth application credentials shared by every connection of a
/// provider; constructed once at process start and injected wherever
/// events are fetched. A provider left unconfigured at deploy time turns
/// into a configuration error for its connections.
pub struct RemoteCalendars {
    google: Option<GoogleConfig>,
    office365: Option<Office365Config>,
    timeout: Duration,
}

impl RemoteCalendars {
    pub fn new(google: Option<GoogleConfig>, office365: Option<Office365Config>) -> Self {
        Self {
            google,
            office365,
            timeout: Duration::from_secs(30),
        }
    }

    /// Timeout applied to the CalDAV adapter (OAuth adapters carry their
    /// own timeout inside their configs).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SourceFactory for RemoteCalendars {
    /// Returns the adapter for one connection.
    fn source_for(&self, account: &ProviderAccount) -> ProviderResult<Box<dyn CalendarSource>> {
        match account.kind {
            CalendarKind::Google => {
                let config = self.google.clone().ok_or_else(|| {
                    ProviderError::configuration("google oauth application is not configured")
                })?;
                let access_token = require(&account.access_token, "access token")?;
                let source =
                    GoogleSource::new(config, access_token, account.refresh_token.clone())?;
                Ok(Box::new(source))
            }
            CalendarKind::Office365 => {
                let config = self.office365.clone().ok_or_else(|| {
                    ProviderError::configuration("office365 oauth application is not configured")
                })?;
                let access_token = require(&account.access_token, "access token")?;
                let source =
                    Office365Source::new(config, access_token, account.refresh_token.clone())?;
                Ok(Box::new(source))
            }
            CalendarKind::Apple => {
                let server_url = require(&account.server_url, "server url")?;
                let password = require(&account.password, "app password")?;
                let config = CalDavConfig::new(server_url, &account.email, password)?
                    .with_timeout(self.timeout);
                Ok(Box::new(CalDavSource::new(config)?))
            }
        }
    }
}

fn require<'a>(field: &'a Option<String>, name: &str) -> ProviderResult<&'a str> {
    field
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::configuration(format!("connection is missing its {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    fn remotes() -> RemoteCalendars {
        RemoteCalendars::new(
            Some(GoogleConfig::new("id", "secret", "https://app/oauth/google")),
            Some(Office365Config::new("id", "secret", "https://app/oauth/o365")),
        )
    }

    fn google_account() -> ProviderAccount {
        ProviderAccount {
            kind: CalendarKind::Google,
            email: "parent@example.com".to_string(),
            access_token: Some("ya29.token".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            password: None,
            server_url: None,
        }
    }

    #[test]
    fn dispatches_each_kind() {
        let remotes = remotes();

        let google = remotes.source_for(&google_account()).unwrap();
        assert_eq!(google.kind(), CalendarKind::Google);

        let office = remotes
            .source_for(&ProviderAccount {
                kind: CalendarKind::Office365,
                access_token: Some("eyJ.token".to_string()),
                ..google_account()
            })
            .unwrap();
        assert_eq!(office.kind(), CalendarKind::Office365);

        let apple = remotes
            .source_for(&ProviderAccount {
                kind: CalendarKind::Apple,
                access_token: None,
                refresh_token: None,
                password: Some("app-password".to_string()),
                server_url: Some("https://caldav.icloud.com/123/calendars/".to_string()),
                ..google_account()
            })
            .unwrap();
        assert_eq!(apple.kind(), CalendarKind::Apple);
    }

    #[test]
    fn missing_token_is_configuration_error() {
        let remotes = remotes();
        let mut account = google_account();
        account.access_token = None;

        let err = match remotes.source_for(&account) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn unconfigured_provider_is_configuration_error() {
        let remotes = RemoteCalendars::new(None, None);

        let err = match remotes.source_for(&google_account()) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn apple_requires_server_url_and_password() {
        let remotes = remotes();
        let account = ProviderAccount {
            kind: CalendarKind::Apple,
            access_token: None,
            refresh_token: None,
            password: None,
            server_url: Some("https://caldav.icloud.com/123/calendars/".to_string()),
            ..google_account()
        };

        let err = match remotes.source_for(&account) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }
}
