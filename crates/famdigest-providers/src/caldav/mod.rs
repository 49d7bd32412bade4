//! CalDAV adapter for Apple iCloud and other CalDAV servers.
//!
//! Authenticates with an app-specific password over Basic auth (TLS only),
//! discovers calendars via PROPFIND, and fetches events via a
//! calendar-query REPORT whose time-range filter has the server expand
//! recurring events.

mod client;
mod config;
mod ics;
mod source;
mod xml;

pub use client::CalDavClient;
pub use config::CalDavConfig;
pub use source::CalDavSource;
