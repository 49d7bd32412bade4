//! Low-level Google Calendar API v3 client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::{RawEvent, RawEventTime};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// HTTP client for the Calendar API, bound to one access token.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    access_token: String,
}

impl GoogleCalendarClient {
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            access_token: access_token.into(),
        })
    }

    /// Swaps in a freshly refreshed access token.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    /// Lists the account's calendars.
    pub async fn list_calendars(&self) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{CALENDAR_API_BASE}/users/me/calendarList");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let body = Self::read_success_body(response).await?;
        let list: CalendarListResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse calendar list: {e}"))
        })?;

        Ok(list.items)
    }

    /// Lists single events of one calendar inside `[time_min, time_max)`,
    /// following `nextPageToken` until the result is complete.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> ProviderResult<Vec<RawEvent>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(calendar_id, time_min, time_max, page_token.as_deref())
                .await?;

            for event in page.items {
                if let Some(raw) = convert_event(event) {
                    all_events.push(raw);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            calendar = calendar_id,
            count = all_events.len(),
            "fetched google events"
        );
        Ok(all_events)
    }

    async fn list_events_page(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!(
            "{CALENDAR_API_BASE}/calendars/{}/events",
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(ProviderError::from_transport)?;
        let body = Self::read_success_body(response).await?;

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("failed to parse events: {e}")))
    }

    /// Maps the response status onto the error taxonomy and returns the body.
    async fn read_success_body(response: reqwest::Response) -> ProviderResult<String> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::authentication(
                "access token expired or revoked",
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::rate_limited("rate limit exceeded"));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found("calendar not found"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::unavailable(format!(
                "API error ({status}): {body}"
            )));
        }

        response.text().await.map_err(ProviderError::from_transport)
    }
}

/// Converts an API event into a [`RawEvent`].
///
/// Cancelled entries are kept here and filtered during normalization so
/// the filter logic lives in one place.
fn convert_event(event: ApiEvent) -> Option<RawEvent> {
    let id = event.id?;

    let start = convert_event_time(&event.start)?;
    let end = event.end.as_ref().and_then(convert_event_time_ref);

    let mut raw = RawEvent::new(id, start);
    if let Some(end) = end {
        raw = raw.with_end(end);
    }
    if let Some(summary) = event.summary {
        raw = raw.with_summary(summary);
    }
    if let Some(status) = event.status {
        raw = raw.with_status(status);
    }
    Some(raw)
}

fn convert_event_time(time: &Option<ApiEventTime>) -> Option<RawEventTime> {
    time.as_ref().and_then(convert_event_time_ref)
}

fn convert_event_time_ref(time: &ApiEventTime) -> Option<RawEventTime> {
    match (&time.date_time, &time.date) {
        (Some(dt), _) => match DateTime::parse_from_rfc3339(dt) {
            Ok(parsed) => Some(RawEventTime::DateTime(parsed.with_timezone(&Utc))),
            Err(e) => {
                warn!(value = %dt, error = %e, "unparseable google event datetime");
                None
            }
        },
        (None, Some(date)) => match chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(parsed) => Some(RawEventTime::Date(parsed)),
            Err(e) => {
                warn!(value = %date, error = %e, "unparseable google event date");
                None
            }
        },
        (None, None) => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    status: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

/// One calendar from the calendarList endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timed_event() {
        let json = r#"{
            "id": "evt-1",
            "summary": "Piano recital",
            "start": {"dateTime": "2025-06-02T17:00:00Z"},
            "end": {"dateTime": "2025-06-02T18:00:00Z"},
            "status": "confirmed"
        }"#;

        let event: ApiEvent = serde_json::from_str(json).unwrap();
        let raw = convert_event(event).unwrap();

        assert_eq!(raw.external_id, "evt-1");
        assert_eq!(raw.effective_title(), "Piano recital");
        assert!(!raw.start.is_all_day());
        assert!(raw.end.is_some());
    }

    #[test]
    fn parse_all_day_event() {
        let json = r#"{
            "id": "evt-2",
            "summary": "School holiday",
            "start": {"date": "2025-06-02"},
            "end": {"date": "2025-06-03"}
        }"#;

        let event: ApiEvent = serde_json::from_str(json).unwrap();
        let raw = convert_event(event).unwrap();

        assert!(raw.start.is_all_day());
    }

    #[test]
    fn event_without_start_is_skipped() {
        let json = r#"{"id": "evt-3", "summary": "broken"}"#;
        let event: ApiEvent = serde_json::from_str(json).unwrap();
        assert!(convert_event(event).is_none());
    }

    #[test]
    fn parse_event_list_with_page_token() {
        let json = r#"{
            "items": [{"id": "evt-1", "start": {"dateTime": "2025-06-02T09:00:00Z"}}],
            "nextPageToken": "page-2"
        }"#;

        let list: EventListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.next_page_token.as_deref(), Some("page-2"));
    }

    #[test]
    fn parse_calendar_list() {
        let json = r#"{
            "items": [
                {"id": "primary", "summary": "Family", "primary": true},
                {"id": "school@group.calendar.google.com", "summary": "School"}
            ]
        }"#;

        let list: CalendarListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(list.items.len(), 2);
        assert!(list.items[0].primary);
        assert!(!list.items[1].primary);
    }
}
