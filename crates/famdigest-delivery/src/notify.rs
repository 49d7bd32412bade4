//! Keyed notifications and their templates.
//!
//! Callers never format message text; they pick a [`NotificationKey`] and
//! supply a structured [`NotificationPayload`]. The key resolves to a
//! template here, in the delivery layer.

use std::fmt;
use std::sync::Arc;

use famdigest_core::DeliveryChannel;
use tracing::debug;

use crate::email::EmailSender;
use crate::error::{DeliveryError, DeliveryResult};
use crate::sms::{SmsReceipt, SmsSender};

/// The notifications famdigest sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKey {
    /// Owner-facing: a subscriber just confirmed.
    OwnerSubscriberOptInConfirmation,
    /// Recipient-facing: confirmation after replying "yes".
    ContactOptInConfirmation,
    /// Recipient-facing: the initial or resent opt-in request.
    ContactOptInRequest,
    /// Recipient-facing: the daily digest itself.
    ContactDailyDigest,
}

impl NotificationKey {
    /// The stable dotted key the templates are registered under.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwnerSubscriberOptInConfirmation => "owner.subscriberOptInConfirmation",
            Self::ContactOptInConfirmation => "contact.optInConfirmation",
            Self::ContactOptInRequest => "contact.optInRequest",
            Self::ContactDailyDigest => "contact.dailyDigest",
        }
    }
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The structured payload a caller supplies with a key.
#[derive(Debug, Clone, Default)]
pub struct NotificationPayload {
    pub owner_name: String,
    pub contact_name: String,
    pub workspace_name: String,
    /// The composed digest text, for [`NotificationKey::ContactDailyDigest`].
    pub digest_body: Option<String>,
}

/// A rendered notification, ready for any channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    /// Subject line, used by the email channel.
    pub subject: String,
    /// Message text, used by both channels.
    pub body: String,
}

/// Resolves a key + payload to concrete text.
pub fn render(key: NotificationKey, payload: &NotificationPayload) -> RenderedNotification {
    match key {
        NotificationKey::OwnerSubscriberOptInConfirmation => RenderedNotification {
            subject: format!("{} is now subscribed", payload.contact_name),
            body: format!(
                "{} confirmed their subscription and will start receiving the daily \
                 digest for {}.",
                payload.contact_name, payload.workspace_name
            ),
        },
        NotificationKey::ContactOptInConfirmation => RenderedNotification {
            subject: "You're subscribed".to_string(),
            body: format!(
                "You're all set, {}! You'll receive {}'s family digest every day.",
                payload.contact_name, payload.owner_name
            ),
        },
        NotificationKey::ContactOptInRequest => RenderedNotification {
            subject: format!("{} wants to send you a daily digest", payload.owner_name),
            body: format!(
                "Hi {}! {} would like to send you a daily digest of their family \
                 calendar. Reply YES to start receiving it.",
                payload.contact_name, payload.owner_name
            ),
        },
        NotificationKey::ContactDailyDigest => RenderedNotification {
            subject: format!("Today with {}", payload.owner_name),
            body: payload.digest_body.clone().unwrap_or_default(),
        },
    }
}

/// A contact's reachable addresses.
#[derive(Debug, Clone, Default)]
pub struct ContactAddress {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// The delivery collaborator: fans a keyed notification out to the
/// requested channels.
///
/// Built once at process start around the injected senders and shared
/// read-only afterwards.
#[derive(Clone)]
pub struct Notifier {
    sms: Arc<dyn SmsSender>,
    email: Arc<dyn EmailSender>,
}

impl Notifier {
    pub fn new(sms: Arc<dyn SmsSender>, email: Arc<dyn EmailSender>) -> Self {
        Self { sms, email }
    }

    /// Sends a keyed notification to a contact over `channel`.
    ///
    /// Returns the SMS receipt when an SMS went out, so the caller can log
    /// it. A channel whose address is missing is an error; partial
    /// delivery (sms ok, email failed) surfaces the email failure after
    /// the sms receipt was obtained, and the caller decides what to log.
    pub async fn contact(
        &self,
        key: NotificationKey,
        channel: DeliveryChannel,
        address: &ContactAddress,
        payload: &NotificationPayload,
    ) -> DeliveryResult<Option<SmsReceipt>> {
        let rendered = render(key, payload);
        debug!(key = %key, channel = %channel, "sending contact notification");

        let mut receipt = None;

        if channel.includes_sms() {
            let phone = address.phone.as_deref().ok_or_else(|| {
                DeliveryError::InvalidAddress(format!("{key}: contact has no phone number"))
            })?;
            receipt = Some(self.sms.send(phone, &rendered.body).await?);
        }

        if channel.includes_email() {
            let email = address.email.as_deref().ok_or_else(|| {
                DeliveryError::InvalidAddress(format!("{key}: contact has no email address"))
            })?;
            self.email
                .send(email, &rendered.subject, &rendered.body)
                .await?;
        }

        Ok(receipt)
    }

    /// Sends a keyed notification to an owner, always by email.
    pub async fn owner(
        &self,
        key: NotificationKey,
        owner_email: &str,
        payload: &NotificationPayload,
    ) -> DeliveryResult<()> {
        let rendered = render(key, payload);
        debug!(key = %key, "sending owner notification");
        self.email
            .send(owner_email, &rendered.subject, &rendered.body)
            .await
    }
}
