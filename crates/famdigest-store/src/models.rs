//! Row types for the famdigest datastore.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use famdigest_core::{CalendarKind, DeliveryChannel, EventPreference, NotifySlot, UnknownVariant};

/// The owner directory entry the digest pipeline reads.
///
/// Account management lives in the dashboard; this row only carries what
/// composition and notifications need: a display name and contact
/// addresses.
#[derive(Debug, Clone)]
pub struct Owner {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A link between an owner and one external calendar account.
///
/// Created on a successful provider authorization. `error` holds the
/// owner-facing reconnect prompt after an authentication failure; it is
/// cleared on the next successful fetch.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: i64,
    pub owner_id: String,
    pub provider: CalendarKind,
    pub email: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Sealed CalDAV app password (base64 nonce || ciphertext).
    pub password_sealed: Option<String>,
    pub server_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a [`Connection`].
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub owner_id: String,
    pub provider: CalendarKind,
    pub email: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub password_sealed: Option<String>,
    pub server_url: Option<String>,
}

/// One enumerable calendar within a connection.
///
/// Upserted lazily the first time its connection's calendars are listed;
/// the owner toggles `enabled` from the dashboard.
#[derive(Debug, Clone)]
pub struct Calendar {
    pub id: i64,
    pub connection_id: i64,
    pub owner_id: String,
    pub external_id: String,
    pub summary: String,
    pub enabled: bool,
}

/// A configured digest recipient.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub owner_id: String,
    pub workspace_id: String,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    /// UTC notification time on the 15-minute grid.
    pub notify_on: NotifySlot,
    /// IANA timezone name used to build the day window.
    pub timezone: String,
    pub opt_in: bool,
    pub enabled: bool,
    pub event_preference: EventPreference,
    pub channel: DeliveryChannel,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a [`Subscription`]. New subscribers start
/// unconfirmed (`opt_in = false`) until they reply "yes".
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub owner_id: String,
    pub workspace_id: String,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notify_on: NotifySlot,
    pub timezone: String,
    pub event_preference: EventPreference,
    pub channel: DeliveryChannel,
}

/// Direction of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageDirection {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            other => Err(UnknownVariant {
                field: "direction",
                value: other.to_string(),
            }),
        }
    }
}

/// One sent or received message tied to a subscription. Append-only; the
/// newest row drives the opt-in resend cool-down.
#[derive(Debug, Clone)]
pub struct MessageLog {
    pub id: i64,
    pub subscription_id: i64,
    /// Provider message id (Twilio SID), when known.
    pub external_id: Option<String>,
    pub body: String,
    pub segments: u32,
    pub direction: MessageDirection,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending a [`MessageLog`] row. `created_at` is explicit so
/// the resend gate can be tested against fixed instants.
#[derive(Debug, Clone)]
pub struct NewMessageLog {
    pub subscription_id: i64,
    pub external_id: Option<String>,
    pub body: String,
    pub segments: u32,
    pub direction: MessageDirection,
    pub created_at: DateTime<Utc>,
}
