//! Shared fakes and wiring for the server tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use famdigest_compose::{ComposeError, ComposeResult, DigestRequest, Summarizer};
use famdigest_core::{CalendarKind, DayWindow, SecretBox};
use famdigest_delivery::{
    DeliveryResult, EmailSender, Notifier, OptInTracker, SmsReceipt, SmsSender,
};
use famdigest_providers::source::{BoxFuture, CalendarListing, CalendarSource};
use famdigest_providers::{
    ProviderAccount, ProviderError, ProviderErrorCode, ProviderResult, RawEvent, SourceFactory,
};
use famdigest_store::Store;

use crate::app::AppState;

#[derive(Default)]
pub struct RecordingSms {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl SmsSender for RecordingSms {
    fn send<'a>(
        &'a self,
        to: &'a str,
        body: &'a str,
    ) -> famdigest_delivery::BoxFuture<'a, DeliveryResult<SmsReceipt>> {
        Box::pin(async move {
            let mut sent = self.sent.lock().unwrap();
            sent.push((to.to_string(), body.to_string()));
            Ok(SmsReceipt {
                external_id: format!("SM-{}", sent.len()),
                segments: 1,
            })
        })
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl EmailSender for RecordingEmail {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> famdigest_delivery::BoxFuture<'a, DeliveryResult<()>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push((
                to.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            Ok(())
        })
    }
}

/// Summarizer fake: records every request, fails for chosen recipients.
#[derive(Default)]
pub struct ScriptedSummarizer {
    pub requests: Mutex<Vec<DigestRequest>>,
    pub fail_for: Vec<String>,
}

impl Summarizer for ScriptedSummarizer {
    fn summarize<'a>(
        &'a self,
        request: &'a DigestRequest,
    ) -> famdigest_compose::BoxFuture<'a, ComposeResult<String>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail_for.contains(&request.recipient_name) {
                return Err(ComposeError::MalformedResponse(
                    "missing output field".to_string(),
                ));
            }
            Ok(format!(
                "{} has {} events today.",
                request.owner_name,
                request.events.len()
            ))
        })
    }
}

/// One account's scripted calendars.
#[derive(Default, Clone)]
pub struct ScriptedCalendars {
    /// `(external_id, summary, events)` triples, in listing order.
    pub calendars: Vec<(String, String, Vec<RawEvent>)>,
    /// Calendars whose fetch fails with the given code.
    pub failures: HashMap<String, ProviderErrorCode>,
}

struct ScriptedSource {
    script: ScriptedCalendars,
}

impl CalendarSource for ScriptedSource {
    fn kind(&self) -> CalendarKind {
        CalendarKind::Google
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarListing>>> {
        Box::pin(async move {
            Ok(self
                .script
                .calendars
                .iter()
                .map(|(id, summary, _)| CalendarListing::new(id, summary))
                .collect())
        })
    }

    fn day_events<'a>(
        &'a self,
        calendar_external_id: &'a str,
        _window: DayWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(async move {
            if let Some(code) = self.script.failures.get(calendar_external_id) {
                return Err(ProviderError::new(*code, "scripted failure"));
            }
            Ok(self
                .script
                .calendars
                .iter()
                .find(|(id, _, _)| id == calendar_external_id)
                .map(|(_, _, events)| events.clone())
                .unwrap_or_default())
        })
    }
}

/// Source factory fake keyed by account email.
#[derive(Default)]
pub struct FakeSources {
    pub accounts: HashMap<String, ScriptedCalendars>,
}

impl SourceFactory for FakeSources {
    fn source_for(&self, account: &ProviderAccount) -> ProviderResult<Box<dyn CalendarSource>> {
        let script = self
            .accounts
            .get(&account.email)
            .cloned()
            .ok_or_else(|| ProviderError::configuration("no scripted account"))?;
        Ok(Box::new(ScriptedSource { script }))
    }
}

/// The assembled test application plus handles onto its fakes.
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub store: Arc<Store>,
    pub sms: Arc<RecordingSms>,
    pub email: Arc<RecordingEmail>,
    pub summarizer: Arc<ScriptedSummarizer>,
}

pub fn harness(sources: FakeSources, summarizer: ScriptedSummarizer) -> TestHarness {
    let store = Arc::new(Store::in_memory().unwrap());
    let sms = Arc::new(RecordingSms::default());
    let email = Arc::new(RecordingEmail::default());
    let summarizer = Arc::new(summarizer);
    let notifier = Notifier::new(sms.clone(), email.clone());
    let tracker = OptInTracker::new(store.clone(), notifier.clone());

    let state = Arc::new(AppState {
        store: store.clone(),
        sources: Arc::new(sources),
        summarizer: summarizer.clone(),
        notifier,
        tracker,
        secrets: SecretBox::new(&[7u8; 32]).unwrap(),
        google_oauth: None,
        office365_oauth: None,
        oauth_success_url: "/settings/calendars".to_string(),
        oauth_error_url: "/settings/calendars/error".to_string(),
        http_timeout: Duration::from_secs(5),
    });

    TestHarness {
        state,
        store,
        sms,
        email,
        summarizer,
    }
}
