//! Low-level Microsoft Graph client.
//!
//! Uses `calendarView` so the server expands recurring events, and asks
//! Graph to render times in UTC via the `Prefer: outlook.timezone` header.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::{RawEvent, RawEventTime};

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Graph renders datetimes without an offset, e.g. `2025-06-02T09:00:00.0000000`.
const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// HTTP client for Microsoft Graph, bound to one access token.
#[derive(Debug)]
pub struct GraphClient {
    http: reqwest::Client,
    access_token: String,
}

impl GraphClient {
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
    pub async fn list_calendars(&self) -> ProviderResult<Vec<GraphCalendar>> {
        let mut url = format!("{GRAPH_API_BASE}/me/calendars");
        let mut calendars = Vec::new();

        // Calendar lists page like every other Graph collection.
        loop {
            let page: GraphPage<GraphCalendar> = self.get_json(&url).await?;
            calendars.extend(page.value);
            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(calendars)
    }

    /// Lists expanded event instances of one calendar inside
    /// `[start, end)`, following `@odata.nextLink` continuations.
    pub async fn calendar_view(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ProviderResult<Vec<RawEvent>> {
        let mut url = format!(
            "{GRAPH_API_BASE}/me/calendars/{}/calendarView?startDateTime={}&endDateTime={}",
            urlencoding::encode(calendar_id),
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
        );

        let mut all_events = Vec::new();
        loop {
            let page: GraphPage<GraphEvent> = self.get_json(&url).await?;
            for event in page.value {
                if let Some(raw) = convert_event(event) {
                    all_events.push(raw);
                }
            }
            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }

        debug!(
            calendar = calendar_id,
            count = all_events.len(),
            "fetched graph events"
        );
        Ok(all_events)
    }

    /// The signed-in user's profile, read once after authorization to fill
    /// the connection's email column.
    pub async fn me(&self) -> ProviderResult<GraphProfile> {
        self.get_json(&format!("{GRAPH_API_BASE}/me")).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ProviderResult<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .header("Prefer", "outlook.timezone=\"UTC\"")
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::authentication(
                "access token expired or revoked",
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::rate_limited("graph throttling in effect"));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found("calendar not found"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::unavailable(format!(
                "graph error ({status}): {body}"
            )));
        }

        let body = response.text().await.map_err(ProviderError::from_transport)?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse graph response: {e}"))
        })
    }
}

fn convert_event(event: GraphEvent) -> Option<RawEvent> {
    let start = convert_event_time(event.start.as_ref()?, event.is_all_day)?;
    let end = event
        .end
        .as_ref()
        .and_then(|t| convert_event_time(t, event.is_all_day));

    let mut raw = RawEvent::new(event.id, start);
    if let Some(end) = end {
        raw = raw.with_end(end);
    }
    if let Some(subject) = event.subject {
        raw = raw.with_summary(subject);
    }
    if event.is_cancelled {
        raw = raw.with_status("cancelled");
    }
    Some(raw)
}

/// Resolves a Graph `dateTime`/`timeZone` pair to an absolute instant.
///
/// The `Prefer` header means the zone is normally "UTC"; other IANA names
/// are resolved through chrono-tz rather than trusted as wall clock.
fn convert_event_time(time: &GraphDateTime, is_all_day: bool) -> Option<RawEventTime> {
    let naive = match NaiveDateTime::parse_from_str(&time.date_time, GRAPH_DATETIME_FORMAT) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(value = %time.date_time, error = %e, "unparseable graph datetime");
            return None;
        }
    };

    if is_all_day {
        return Some(RawEventTime::Date(naive.date()));
    }

    let zone = time.time_zone.as_deref().unwrap_or("UTC");
    let instant = if zone.eq_ignore_ascii_case("UTC") {
        naive.and_utc()
    } else {
        match Tz::from_str(zone) {
            Ok(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| naive.and_utc()),
            Err(_) => {
                warn!(zone = %zone, "unknown graph timezone, treating as UTC");
                naive.and_utc()
            }
        }
    };

    Some(RawEventTime::DateTime(instant))
}

#[derive(Debug, Deserialize)]
struct GraphPage<T> {
    #[serde(default)]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// One calendar from `/me/calendars`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCalendar {
    pub id: String,
    pub name: String,
}

/// The signed-in user, from `/me`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphProfile {
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
}

impl GraphProfile {
    /// The address to record on the connection; `mail` can be unset for
    /// accounts without a mailbox, the UPN always exists.
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .or(self.user_principal_name.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent {
    id: String,
    subject: Option<String>,
    start: Option<GraphDateTime>,
    end: Option<GraphDateTime>,
    #[serde(default)]
    is_all_day: bool,
    #[serde(default)]
    is_cancelled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    time_zone: Option<String>,
}
