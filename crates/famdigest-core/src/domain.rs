//! Closed domain enums shared across the workspace.
//!
//! These are deliberately closed: adapter dispatch, delivery routing, and
//! day-window selection all use exhaustive matches over them, so adding a
//! variant forces every call site to be revisited at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of external calendar account behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarKind {
    /// Google Calendar (OAuth, Calendar API v3).
    Google,
    /// Office 365 / Outlook (OAuth, Microsoft Graph).
    Office365,
    /// Apple iCloud or any other CalDAV server (app password, CalDAV).
    Apple,
}

impl CalendarKind {
    /// Returns the stable lowercase name used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Office365 => "office365",
            Self::Apple => "apple",
        }
    }
}

impl fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CalendarKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "office365" => Ok(Self::Office365),
            "apple" => Ok(Self::Apple),
            other => Err(UnknownVariant {
                field: "provider",
                value: other.to_string(),
            }),
        }
    }
}

/// The channel(s) a subscriber receives digests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    Sms,
    Email,
    Both,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::Both => "both",
        }
    }

    /// Whether this channel includes SMS delivery.
    pub fn includes_sms(&self) -> bool {
        matches!(self, Self::Sms | Self::Both)
    }

    /// Whether this channel includes email delivery.
    pub fn includes_email(&self) -> bool {
        matches!(self, Self::Email | Self::Both)
    }
}

impl fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeliveryChannel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(Self::Sms),
            "email" => Ok(Self::Email),
            "both" => Ok(Self::Both),
            other => Err(UnknownVariant {
                field: "channel",
                value: other.to_string(),
            }),
        }
    }
}

/// Which day a subscriber's digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventPreference {
    /// The digest covers the day it is sent.
    SameDay,
    /// The digest covers the following day (evening previews).
    NextDay,
}

impl EventPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameDay => "same-day",
            Self::NextDay => "next-day",
        }
    }

    /// Offset in days from "today" to the day this preference covers.
    pub fn day_offset(&self) -> i64 {
        match self {
            Self::SameDay => 0,
            Self::NextDay => 1,
        }
    }
}

impl fmt::Display for EventPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventPreference {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same-day" => Ok(Self::SameDay),
            "next-day" => Ok(Self::NextDay),
            other => Err(UnknownVariant {
                field: "event_preference",
                value: other.to_string(),
            }),
        }
    }
}

/// Error returned when parsing a stored enum value fails.
///
/// Stored values are written by this codebase, so hitting this means the
/// row predates a variant rename or the database was edited by hand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field} value: {value:?}")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}
