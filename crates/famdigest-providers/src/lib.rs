//! Calendar provider adapters and the provider-agnostic dispatch.

pub mod caldav;
pub mod error;
pub mod google;
pub mod normalize;
pub mod office365;
pub mod raw_event;
pub mod remote;
pub mod source;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use normalize::normalize_events;
pub use raw_event::{RawEvent, RawEventTime};
pub use remote::{ProviderAccount, RemoteCalendars, SourceFactory};
pub use source::{BoxFuture, CalendarListing, CalendarSource};
