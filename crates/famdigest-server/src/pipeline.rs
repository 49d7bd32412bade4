//! The per-tick digest pipeline.
//!
//! One tick: floor "now" to the 15-minute grid, select the subscriptions
//! stored against that exact slot, and run each through
//! fetch → merge → compose → deliver as an independent unit of work.
//! Failures are captured per unit; nothing here aborts the batch.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use famdigest_compose::DigestRequest;
use famdigest_core::{DayWindow, DigestEvent, NotifySlot, SecretBox, merge_timelines};
use famdigest_delivery::{ContactAddress, NotificationKey, NotificationPayload};
use famdigest_providers::{ProviderAccount, ProviderErrorCode, normalize_events};
use famdigest_store::{Connection, StoreError, Subscription};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::AppState;

/// The observability summary a tick returns. Not a stable public API.
#[derive(Debug, Serialize)]
pub struct TickSummary {
    /// The quantized UTC slot this tick served.
    pub slot: String,
    /// How many subscriptions matched the slot.
    pub matched: usize,
    pub digests: Vec<DigestOutcome>,
}

/// What happened to one subscription's digest.
#[derive(Debug, Serialize)]
pub struct DigestOutcome {
    pub subscription_id: i64,
    pub owner_id: String,
    /// The local date the digest covered.
    pub date: NaiveDate,
    pub event_count: usize,
    /// The merged timeline, for observability.
    pub events: Vec<DigestEvent>,
    /// The composed text, when compose succeeded.
    pub message: Option<String>,
    pub delivered: bool,
    /// The unit-level failure, when one occurred.
    pub error: Option<String>,
    /// Calendars skipped during the fetch phase.
    pub calendar_errors: Vec<CalendarFetchError>,
}

/// One skipped calendar fetch.
#[derive(Debug, Serialize)]
pub struct CalendarFetchError {
    pub connection_id: i64,
    /// The calendar's display name; absent when the whole connection
    /// failed before reaching any calendar.
    pub calendar: Option<String>,
    pub error: String,
}

/// Runs one scheduler tick.
pub async fn run_tick(state: &AppState, now: DateTime<Utc>) -> Result<TickSummary, StoreError> {
    let slot = NotifySlot::floor_from_utc(now);
    let due = state.store.subscriptions_due(&slot)?;

    info!(slot = %slot, matched = due.len(), "running digest tick");

    let mut digests = Vec::with_capacity(due.len());
    for subscription in &due {
        // Each subscription is an independent unit of work; its outcome
        // carries its own errors.
        digests.push(run_subscription(state, subscription, now).await);
    }

    Ok(TickSummary {
        slot: slot.to_string(),
        matched: due.len(),
        digests,
    })
}

async fn run_subscription(
    state: &AppState,
    subscription: &Subscription,
    now: DateTime<Utc>,
) -> DigestOutcome {
    let mut outcome = DigestOutcome {
        subscription_id: subscription.id,
        owner_id: subscription.owner_id.clone(),
        date: now.date_naive(),
        event_count: 0,
        events: Vec::new(),
        message: None,
        delivered: false,
        error: None,
        calendar_errors: Vec::new(),
    };

    let tz = match Tz::from_str(&subscription.timezone) {
        Ok(tz) => tz,
        Err(_) => {
            outcome.error = Some(format!(
                "configuration error: unknown timezone {:?}",
                subscription.timezone
            ));
            return outcome;
        }
    };
    let window = DayWindow::for_offset(now, tz, subscription.event_preference.day_offset());
    outcome.date = window.date;

    let connections = match state.store.connections_for_owner(&subscription.owner_id) {
        Ok(connections) => connections,
        Err(e) => {
            outcome.error = Some(format!("store error: {e}"));
            return outcome;
        }
    };

    let mut per_calendar: Vec<Vec<DigestEvent>> = Vec::new();
    for connection in &connections {
        fetch_connection(state, connection, window, &mut per_calendar, &mut outcome).await;
    }

    let merged = merge_timelines(per_calendar);
    outcome.event_count = merged.len();
    outcome.events = merged.clone();

    let owner_name = owner_display_name(state, &subscription.owner_id);
    let request = DigestRequest::new(&subscription.full_name, &owner_name, window.date, &merged);

    let message = match state.summarizer.summarize(&request).await {
        Ok(message) => message,
        Err(e) => {
            warn!(
                subscription = subscription.id,
                error = %e,
                "compose failed"
            );
            outcome.error = Some(format!("compose failed: {e}"));
            return outcome;
        }
    };
    outcome.message = Some(message.clone());

    let payload = NotificationPayload {
        owner_name,
        contact_name: subscription.full_name.clone(),
        workspace_name: subscription.workspace_id.clone(),
        digest_body: Some(message.clone()),
    };
    let address = ContactAddress {
        phone: Some(subscription.phone.clone()),
        email: subscription.email.clone(),
    };

    match state
        .notifier
        .contact(
            NotificationKey::ContactDailyDigest,
            subscription.channel,
            &address,
            &payload,
        )
        .await
    {
        Ok(receipt) => {
            outcome.delivered = true;
            if let Err(e) = state
                .tracker
                .log_outbound(subscription.id, &message, receipt, now)
            {
                warn!(subscription = subscription.id, error = %e, "failed to log digest send");
            }
        }
        Err(e) => {
            warn!(subscription = subscription.id, error = %e, "digest delivery failed");
            outcome.error = Some(format!("delivery failed: {e}"));
        }
    }

    outcome
}

/// Fetches every enabled calendar of one connection into `per_calendar`.
///
/// A failed calendar is skipped and recorded; the owner's remaining
/// calendars still contribute. Authentication failures are additionally
/// written to the connection row as its displayed reconnect state.
async fn fetch_connection(
    state: &AppState,
    connection: &Connection,
    window: DayWindow,
    per_calendar: &mut Vec<Vec<DigestEvent>>,
    outcome: &mut DigestOutcome,
) {
    let errors_before = outcome.calendar_errors.len();

    let account = match account_for(connection, &state.secrets) {
        Ok(account) => account,
        Err(e) => {
            outcome.calendar_errors.push(CalendarFetchError {
                connection_id: connection.id,
                calendar: None,
                error: e,
            });
            return;
        }
    };

    let source = match state.sources.source_for(&account) {
        Ok(source) => source,
        Err(e) => {
            record_connection_failure(state, connection, None, &e, outcome);
            return;
        }
    };

    let calendars = match state.store.enabled_calendars_for_connection(connection.id) {
        Ok(calendars) => calendars,
        Err(e) => {
            outcome.calendar_errors.push(CalendarFetchError {
                connection_id: connection.id,
                calendar: None,
                error: format!("store error: {e}"),
            });
            return;
        }
    };

    for calendar in &calendars {
        match source.day_events(&calendar.external_id, window).await {
            Ok(raw) => {
                per_calendar.push(normalize_events(&raw, &calendar.summary, &window));
            }
            Err(e) => {
                record_connection_failure(state, connection, Some(&calendar.summary), &e, outcome);
            }
        }
    }

    // A clean pass clears any stale reconnect prompt on the connection.
    if outcome.calendar_errors.len() == errors_before && connection.error.is_some() {
        if let Err(e) = state.store.set_connection_error(connection.id, None) {
            warn!(connection = connection.id, error = %e, "failed to clear connection error");
        }
    }
}

fn record_connection_failure(
    state: &AppState,
    connection: &Connection,
    calendar: Option<&str>,
    error: &famdigest_providers::ProviderError,
    outcome: &mut DigestOutcome,
) {
    warn!(
        connection = connection.id,
        calendar = calendar.unwrap_or("-"),
        error = %error,
        "calendar fetch failed"
    );

    if error.code() == ProviderErrorCode::AuthenticationFailed {
        // Surface the reconnect prompt on the owner-facing connection row.
        if let Err(e) = state
            .store
            .set_connection_error(connection.id, Some(error.message()))
        {
            warn!(connection = connection.id, error = %e, "failed to record connection error");
        }
    }

    outcome.calendar_errors.push(CalendarFetchError {
        connection_id: connection.id,
        calendar: calendar.map(str::to_string),
        error: error.to_string(),
    });
}

/// Maps a connection row to the credentials the dispatch needs, opening
/// the sealed CalDAV password at the secret boundary.
fn account_for(connection: &Connection, secrets: &SecretBox) -> Result<ProviderAccount, String> {
    let password = match &connection.password_sealed {
        Some(sealed) => Some(
            secrets
                .open(sealed)
                .map_err(|e| format!("failed to open stored credential: {e}"))?,
        ),
        None => None,
    };

    Ok(ProviderAccount {
        kind: connection.provider,
        email: connection.email.clone(),
        access_token: connection.access_token.clone(),
        refresh_token: connection.refresh_token.clone(),
        password,
        server_url: connection.server_url.clone(),
    })
}

fn owner_display_name(state: &AppState, owner_id: &str) -> String {
    match state.store.owner(owner_id) {
        Ok(Some(owner)) => owner.full_name,
        Ok(None) => owner_id.to_string(),
        Err(e) => {
            warn!(owner = owner_id, error = %e, "owner lookup failed");
            owner_id.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSources, ScriptedCalendars, ScriptedSummarizer, TestHarness};
    use chrono::TimeZone;
    use famdigest_core::{CalendarKind, DeliveryChannel, EventPreference};
    use famdigest_providers::{RawEvent, RawEventTime};
    use famdigest_store::{MessageDirection, NewConnection, NewSubscription, Owner};
    use std::collections::HashMap;

    fn utc(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, h, mi, 0).unwrap()
    }

    fn timed_event(id: &str, title: &str, start: DateTime<Utc>) -> RawEvent {
        RawEvent::new(id, RawEventTime::from_datetime(start))
            .with_end(RawEventTime::from_datetime(start + chrono::Duration::hours(1)))
            .with_summary(title)
    }

    fn add_owner_with_account(
        harness: &TestHarness,
        owner_id: &str,
        name: &str,
        email: &str,
        calendars: &[(&str, &str)],
    ) -> i64 {
        harness
            .store
            .upsert_owner(&Owner {
                id: owner_id.to_string(),
                full_name: name.to_string(),
                email: Some(format!("{owner_id}@example.com")),
                phone: None,
            })
            .unwrap();

        let connection_id = harness
            .store
            .insert_connection(&NewConnection {
                owner_id: owner_id.to_string(),
                provider: CalendarKind::Google,
                email: email.to_string(),
                access_token: Some("token".to_string()),
                refresh_token: None,
                password_sealed: None,
                server_url: None,
            })
            .unwrap();

        for (external_id, summary) in calendars {
            harness
                .store
                .upsert_calendar(connection_id, owner_id, external_id, summary)
                .unwrap();
        }
        connection_id
    }

    fn add_confirmed_subscription(
        harness: &TestHarness,
        owner_id: &str,
        full_name: &str,
        phone: &str,
    ) -> i64 {
        let id = harness
            .store
            .insert_subscription(&NewSubscription {
                owner_id: owner_id.to_string(),
                workspace_id: "ws-1".to_string(),
                full_name: full_name.to_string(),
                phone: phone.to_string(),
                email: None,
                notify_on: "09:00".parse().unwrap(),
                timezone: "UTC".to_string(),
                event_preference: EventPreference::SameDay,
                channel: DeliveryChannel::Sms,
            })
            .unwrap();
        harness.store.confirm_opt_in_by_phone(phone).unwrap();
        id
    }

    fn two_calendar_account() -> ScriptedCalendars {
        ScriptedCalendars {
            calendars: vec![
                (
                    "work".to_string(),
                    "Work".to_string(),
                    vec![timed_event("e1", "Dentist", utc(2, 9, 0))],
                ),
                (
                    "home".to_string(),
                    "Home".to_string(),
                    vec![timed_event("e2", "Soccer", utc(2, 14, 30))],
                ),
                ("empty".to_string(), "Empty".to_string(), vec![]),
            ],
            failures: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn end_to_end_merges_composes_and_delivers() {
        let mut sources = FakeSources::default();
        sources
            .accounts
            .insert("dana@example.com".to_string(), two_calendar_account());
        let harness = crate::test_support::harness(sources, ScriptedSummarizer::default());

        add_owner_with_account(
            &harness,
            "owner-1",
            "Dana",
            "dana@example.com",
            &[("work", "Work"), ("home", "Home"), ("empty", "Empty")],
        );
        let sub_id = add_confirmed_subscription(&harness, "owner-1", "Grandma", "+15550001111");

        // Tick at 09:07 floors to the 09:00 slot.
        let summary = run_tick(&harness.state, utc(2, 9, 7)).await.unwrap();

        assert_eq!(summary.slot, "09:00");
        assert_eq!(summary.matched, 1);
        let outcome = &summary.digests[0];
        assert_eq!(outcome.event_count, 2);
        assert!(outcome.delivered);
        assert!(outcome.error.is_none());
        assert!(outcome.calendar_errors.is_empty());

        // Compose was invoked once, with both events serialized in order.
        let requests = harness.summarizer.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].events.len(), 2);
        assert_eq!(requests[0].events[0].title, "Dentist");
        assert_eq!(requests[0].events[1].title, "Soccer");

        // The digest went out over SMS and was logged.
        assert_eq!(harness.sms.sent.lock().unwrap().len(), 1);
        let logs = harness.store.message_logs_for_subscription(sub_id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].direction, MessageDirection::Outbound);
    }

    #[tokio::test]
    async fn compose_failure_is_isolated_per_recipient() {
        let mut sources = FakeSources::default();
        sources
            .accounts
            .insert("dana@example.com".to_string(), two_calendar_account());
        sources
            .accounts
            .insert("sam@example.com".to_string(), two_calendar_account());

        let summarizer = ScriptedSummarizer {
            fail_for: vec!["Uncle Bob".to_string()],
            ..Default::default()
        };
        let harness = crate::test_support::harness(sources, summarizer);

        add_owner_with_account(
            &harness,
            "owner-1",
            "Dana",
            "dana@example.com",
            &[("work", "Work")],
        );
        add_owner_with_account(
            &harness,
            "owner-2",
            "Sam",
            "sam@example.com",
            &[("work", "Work")],
        );
        add_confirmed_subscription(&harness, "owner-1", "Grandma", "+15550001111");
        add_confirmed_subscription(&harness, "owner-2", "Uncle Bob", "+15550002222");

        let summary = run_tick(&harness.state, utc(2, 9, 0)).await.unwrap();

        assert_eq!(summary.matched, 2);
        let ok = summary
            .digests
            .iter()
            .find(|o| o.owner_id == "owner-1")
            .unwrap();
        let failed = summary
            .digests
            .iter()
            .find(|o| o.owner_id == "owner-2")
            .unwrap();

        assert!(ok.delivered);
        assert!(failed.error.as_deref().unwrap().contains("compose failed"));
        assert!(!failed.delivered);
        // Only the successful recipient got a message.
        assert_eq!(harness.sms.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn off_slot_subscriptions_do_not_match() {
        let harness =
            crate::test_support::harness(FakeSources::default(), ScriptedSummarizer::default());
        add_confirmed_subscription(&harness, "owner-1", "Grandma", "+15550001111");

        // 09:20 floors to 09:15, not the stored 09:00.
        let summary = run_tick(&harness.state, utc(2, 9, 20)).await.unwrap();

        assert_eq!(summary.matched, 0);
        assert!(harness.summarizer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_calendar_is_skipped_not_fatal() {
        let mut account = two_calendar_account();
        account
            .failures
            .insert("home".to_string(), ProviderErrorCode::Unavailable);

        let mut sources = FakeSources::default();
        sources.accounts.insert("dana@example.com".to_string(), account);
        let harness = crate::test_support::harness(sources, ScriptedSummarizer::default());

        add_owner_with_account(
            &harness,
            "owner-1",
            "Dana",
            "dana@example.com",
            &[("work", "Work"), ("home", "Home")],
        );
        add_confirmed_subscription(&harness, "owner-1", "Grandma", "+15550001111");

        let summary = run_tick(&harness.state, utc(2, 9, 0)).await.unwrap();

        let outcome = &summary.digests[0];
        // The surviving calendar still contributed its event.
        assert_eq!(outcome.event_count, 1);
        assert!(outcome.delivered);
        assert_eq!(outcome.calendar_errors.len(), 1);
        assert_eq!(outcome.calendar_errors[0].calendar.as_deref(), Some("Home"));
    }

    #[tokio::test]
    async fn auth_failure_surfaces_on_the_connection() {
        let mut account = two_calendar_account();
        account
            .failures
            .insert("work".to_string(), ProviderErrorCode::AuthenticationFailed);

        let mut sources = FakeSources::default();
        sources.accounts.insert("dana@example.com".to_string(), account);
        let harness = crate::test_support::harness(sources, ScriptedSummarizer::default());

        let connection_id = add_owner_with_account(
            &harness,
            "owner-1",
            "Dana",
            "dana@example.com",
            &[("work", "Work")],
        );
        add_confirmed_subscription(&harness, "owner-1", "Grandma", "+15550001111");

        run_tick(&harness.state, utc(2, 9, 0)).await.unwrap();

        let connection = harness.store.connection(connection_id).unwrap().unwrap();
        assert!(connection.error.is_some());
    }

    #[tokio::test]
    async fn clean_fetch_clears_stale_connection_error() {
        let mut sources = FakeSources::default();
        sources
            .accounts
            .insert("dana@example.com".to_string(), two_calendar_account());
        let harness = crate::test_support::harness(sources, ScriptedSummarizer::default());

        let connection_id = add_owner_with_account(
            &harness,
            "owner-1",
            "Dana",
            "dana@example.com",
            &[("work", "Work")],
        );
        add_confirmed_subscription(&harness, "owner-1", "Grandma", "+15550001111");
        harness
            .store
            .set_connection_error(connection_id, Some("stale reconnect prompt"))
            .unwrap();

        run_tick(&harness.state, utc(2, 9, 0)).await.unwrap();

        let connection = harness.store.connection(connection_id).unwrap().unwrap();
        assert!(connection.error.is_none());
    }

    #[tokio::test]
    async fn unknown_timezone_is_a_unit_error() {
        let harness =
            crate::test_support::harness(FakeSources::default(), ScriptedSummarizer::default());

        let id = harness
            .store
            .insert_subscription(&NewSubscription {
                owner_id: "owner-1".to_string(),
                workspace_id: "ws-1".to_string(),
                full_name: "Grandma".to_string(),
                phone: "+15550001111".to_string(),
                email: None,
                notify_on: "09:00".parse().unwrap(),
                timezone: "Mars/Olympus".to_string(),
                event_preference: EventPreference::SameDay,
                channel: DeliveryChannel::Sms,
            })
            .unwrap();
        harness.store.confirm_opt_in_by_phone("+15550001111").unwrap();

        let summary = run_tick(&harness.state, utc(2, 9, 0)).await.unwrap();

        let outcome = summary
            .digests
            .iter()
            .find(|o| o.subscription_id == id)
            .unwrap();
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("unknown timezone"));
    }
}
