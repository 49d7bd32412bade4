//! Core types for famdigest: domain enums, time, events, merge, secrets.

pub mod domain;
pub mod event;
pub mod secrets;
pub mod time;
pub mod tracing;

pub use domain::{CalendarKind, DeliveryChannel, EventPreference, UnknownVariant};
pub use event::{DigestEvent, merge_timelines};
pub use secrets::{SecretBox, SecretError};
pub use time::{DayWindow, EventTime, NotifySlot, SLOT_MINUTES, SlotError};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
