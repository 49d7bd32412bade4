//! The [`CalendarSource`] capability trait.
//!
//! A `CalendarSource` is one authorized calendar account viewed through a
//! uniform lens: it can enumerate its calendars and fetch one day of events
//! from one of them. The scheduler never touches provider APIs directly;
//! it always goes through this trait.

use std::future::Future;
use std::pin::Pin;

use famdigest_core::{CalendarKind, DayWindow};

use crate::error::ProviderResult;
use crate::raw_event::RawEvent;

/// A boxed future for async trait methods, keeping the trait object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One calendar as enumerated by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarListing {
    /// Provider-native calendar identifier.
    pub external_id: String,
    /// Human-readable calendar name.
    pub summary: String,
}

impl CalendarListing {
    pub fn new(external_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            summary: summary.into(),
        }
    }
}

/// A provider-agnostic view of one connected calendar account.
///
/// Implementations must:
/// - resolve provider-local times to absolute instants before returning
///   events (all-day entries stay as bare dates);
/// - treat "no events today" as an empty `Vec`, never an error;
/// - drive pagination/continuation internally so one call yields the
///   complete logical result for the requested window;
/// - bound every HTTP call with a timeout and report timeouts as the
///   unavailable error kind.
pub trait CalendarSource: Send + Sync {
    /// Which provider backs this source.
    fn kind(&self) -> CalendarKind;

    /// Enumerates the account's calendars, in provider order.
    ///
    /// Read-only against the provider API. Fails with
    /// `AuthenticationFailed` on invalid/expired credentials and
    /// `Unavailable` on transient network or server errors.
    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarListing>>>;

    /// Fetches the events of one calendar inside the given day window.
    ///
    /// Events are returned in provider order; the caller merges and sorts.
    /// Same failure modes as [`CalendarSource::list_calendars`].
    fn day_events<'a>(
        &'a self,
        calendar_external_id: &'a str,
        window: DayWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>>;
}
