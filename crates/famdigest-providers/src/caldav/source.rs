//! [`CalendarSource`] implementation for CalDAV servers.

use famdigest_core::{CalendarKind, DayWindow};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEvent;
use crate::source::{BoxFuture, CalendarListing, CalendarSource};

use super::client::CalDavClient;
use super::config::CalDavConfig;
use super::xml;

/// One CalDAV account (Apple iCloud with an app-specific password, or any
/// standards-compliant server).
///
/// Calendar external ids are the collection hrefs reported by PROPFIND.
pub struct CalDavSource {
    client: CalDavClient,
}

impl CalDavSource {
    pub fn new(config: CalDavConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: CalDavClient::new(config)?,
        })
    }

    /// Resolves a calendar href against the configured server.
    fn collection_url(&self, href: &str) -> ProviderResult<String> {
        self.client
            .base_url()
            .join(href)
            .map(|url| url.to_string())
            .map_err(|e| ProviderError::configuration(format!("invalid calendar href: {e}")))
    }
}

impl CalendarSource for CalDavSource {
    fn kind(&self) -> CalendarKind {
        CalendarKind::Apple
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarListing>>> {
        Box::pin(async move {
            let body = xml::propfind_calendars_body();
            let response = self
                .client
                .propfind(self.client.base_url().as_str(), &body, 1)
                .await
                .map_err(|e| e.with_provider("apple"))?;

            let calendars = xml::parse_propfind_response(&response);
            debug!(count = calendars.len(), "discovered caldav calendars");

            Ok(calendars
                .into_iter()
                .map(|cal| {
                    let summary = cal
                        .display_name
                        .clone()
                        .unwrap_or_else(|| cal.href.clone());
                    CalendarListing::new(cal.href, summary)
                })
                .collect())
        })
    }

    fn day_events<'a>(
        &'a self,
        calendar_external_id: &'a str,
        window: DayWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(async move {
            let url = self
                .collection_url(calendar_external_id)
                .map_err(|e| e.with_provider("apple"))?;

            let body = xml::calendar_query_body(window.start, window.end);
            let response = self
                .client
                .report(&url, &body)
                .await
                .map_err(|e| e.with_provider("apple"))?;

            let mut events = Vec::new();
            for (_href, ics) in xml::parse_report_response(&response) {
                events.extend(super::ics::parse_ics_content(&ics));
            }

            debug!(
                calendar = calendar_external_id,
                count = events.len(),
                "fetched caldav events"
            );
            Ok(events)
        })
    }
}
