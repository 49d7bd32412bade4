//! Office 365 / Outlook adapter.
//!
//! Talks to Microsoft Graph with OAuth bearer tokens obtained through the
//! server-side authorization-code flow against login.microsoftonline.com.

mod client;
mod config;
mod oauth;
mod source;

pub use client::{GraphClient, GraphProfile};
pub use config::Office365Config;
pub use oauth::Office365OAuth;
pub use source::Office365Source;
