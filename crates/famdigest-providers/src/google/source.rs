//! [`CalendarSource`] implementation for Google Calendar.

use famdigest_core::{CalendarKind, DayWindow};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::raw_event::RawEvent;
use crate::source::{BoxFuture, CalendarListing, CalendarSource};

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::oauth::GoogleOAuth;

/// One connected Google account.
///
/// Holds the account's access token behind a lock so a mid-call refresh is
/// visible to subsequent calls. If a call is rejected as unauthenticated,
/// the token is refreshed once with the stored refresh token and the call
/// is retried; a failed refresh surfaces as `AuthenticationFailed`, which
/// the pipeline records on the connection as a reconnect prompt.
pub struct GoogleSource {
    oauth: GoogleOAuth,
    client: RwLock<GoogleCalendarClient>,
    refresh_token: Option<String>,
}

impl GoogleSource {
    pub fn new(
        config: GoogleConfig,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|msg| ProviderError::configuration(msg).with_provider("google"))?;

        let client = GoogleCalendarClient::new(access_token, config.timeout)?;
        let oauth = GoogleOAuth::new(config)?;

        Ok(Self {
            oauth,
            client: RwLock::new(client),
            refresh_token,
        })
    }

    async fn refresh_access_token(&self) -> ProviderResult<()> {
        let refresh_token = self.refresh_token.as_ref().ok_or_else(|| {
            ProviderError::authentication("access token rejected and no refresh token stored")
        })?;

        debug!("refreshing google access token after rejected call");
        let grant = self.oauth.refresh(refresh_token).await?;
        self.client.write().await.set_access_token(grant.access_token);
        Ok(())
    }
}

impl CalendarSource for GoogleSource {
    fn kind(&self) -> CalendarKind {
        CalendarKind::Google
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarListing>>> {
        Box::pin(async move {
            let first = self.client.read().await.list_calendars().await;
            let entries = match first {
                Err(e) if e.code() == ProviderErrorCode::AuthenticationFailed => {
                    self.refresh_access_token()
                        .await
                        .map_err(|e| e.with_provider("google"))?;
                    self.client.read().await.list_calendars().await
                }
                other => other,
            }
            .map_err(|e| e.with_provider("google"))?;

            Ok(entries
                .into_iter()
                .map(|entry| CalendarListing::new(entry.id, entry.summary))
                .collect())
        })
    }

    fn day_events<'a>(
        &'a self,
        calendar_external_id: &'a str,
        window: DayWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(async move {
            let first = self
                .client
                .read()
                .await
                .list_events(calendar_external_id, window.start, window.end)
                .await;

            match first {
                Err(e) if e.code() == ProviderErrorCode::AuthenticationFailed => {
                    self.refresh_access_token()
                        .await
                        .map_err(|e| e.with_provider("google"))?;
                    self.client
                        .read()
                        .await
                        .list_events(calendar_external_id, window.start, window.end)
                        .await
                }
                other => other,
            }
            .map_err(|e| e.with_provider("google"))
        })
    }
}
