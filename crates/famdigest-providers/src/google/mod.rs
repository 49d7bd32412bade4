//! Google Calendar adapter.
//!
//! Talks to the Calendar API v3 with OAuth bearer tokens obtained through
//! the server-side authorization-code flow.

mod client;
mod config;
mod oauth;
mod source;

pub use client::GoogleCalendarClient;
pub use config::GoogleConfig;
pub use oauth::{GoogleOAuth, TokenGrant};
pub use source::GoogleSource;
