//! [`CalendarSource`] implementation for Office 365.

use famdigest_core::{CalendarKind, DayWindow};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::raw_event::RawEvent;
use crate::source::{BoxFuture, CalendarListing, CalendarSource};

use super::client::GraphClient;
use super::config::Office365Config;
use super::oauth::Office365OAuth;

/// One connected Office 365 account.
///
/// Mirrors the Google source: a rejected call triggers a single token
/// refresh and retry, and a failed refresh surfaces as
/// `AuthenticationFailed` so the owner sees a reconnect prompt.
pub struct Office365Source {
    oauth: Office365OAuth,
    client: RwLock<GraphClient>,
    refresh_token: Option<String>,
}

impl Office365Source {
    pub fn new(
        config: Office365Config,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|msg| ProviderError::configuration(msg).with_provider("office365"))?;

        let client = GraphClient::new(access_token, config.timeout)?;
        let oauth = Office365OAuth::new(config)?;

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

        debug!("refreshing office365 access token after rejected call");
        let grant = self.oauth.refresh(refresh_token).await?;
        self.client.write().await.set_access_token(grant.access_token);
        Ok(())
    }
}

impl CalendarSource for Office365Source {
    fn kind(&self) -> CalendarKind {
        CalendarKind::Office365
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarListing>>> {
        Box::pin(async move {
            let first = self.client.read().await.list_calendars().await;
            let calendars = match first {
                Err(e) if e.code() == ProviderErrorCode::AuthenticationFailed => {
                    self.refresh_access_token()
                        .await
                        .map_err(|e| e.with_provider("office365"))?;
                    self.client.read().await.list_calendars().await
                }
                other => other,
            }
            .map_err(|e| e.with_provider("office365"))?;

            Ok(calendars
                .into_iter()
                .map(|cal| CalendarListing::new(cal.id, cal.name))
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
                .calendar_view(calendar_external_id, window.start, window.end)
                .await;

            match first {
                Err(e) if e.code() == ProviderErrorCode::AuthenticationFailed => {
                    self.refresh_access_token()
                        .await
                        .map_err(|e| e.with_provider("office365"))?;
                    self.client
                        .read()
                        .await
                        .calendar_view(calendar_external_id, window.start, window.end)
                        .await
                }
                other => other,
            }
            .map_err(|e| e.with_provider("office365"))
        })
    }
}
