//! The opt-in state machine and inbound-reply handling.
//!
//! A subscription is `pending` until its phone number replies with a
//! message containing "yes" (case-insensitive substring, deliberately
//! lenient: "Yes please" confirms). The transition flips every
//! subscription row sharing that phone number in one multi-row update.
//!
//! Confirmation side effects are asymmetric on purpose: the recipient
//! confirmation is sent on every "yes", the owner confirmation only for
//! rows that were not yet confirmed. Re-sending "yes" never produces a
//! second owner notice.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use famdigest_store::{MessageDirection, NewMessageLog, Store, StoreError, Subscription};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::DeliveryError;
use crate::notify::{ContactAddress, NotificationKey, NotificationPayload, Notifier, render};
use crate::sms::SmsReceipt;

/// Errors from the opt-in tracker.
#[derive(Debug, Error)]
pub enum OptInError {
    /// The resend cool-down has not elapsed yet.
    #[error("opt-in request already sent recently (last message at {last_message_at})")]
    CooldownActive { last_message_at: DateTime<Utc> },

    #[error("no such subscription: {0}")]
    UnknownSubscription(i64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// One inbound SMS as received by the webhook, already validated.
#[derive(Debug, Clone)]
pub struct InboundSms {
    /// Sender phone number, E.164.
    pub from: String,
    pub body: String,
    /// Provider message id.
    pub external_id: String,
    pub segments: u32,
}

/// What the state machine decided about an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundDisposition {
    /// "yes" from a pending subscriber; rows were confirmed.
    Confirmed { newly_confirmed: usize },
    /// "yes" from an already-confirmed subscriber.
    AlreadyConfirmed,
    /// Anything else while pending: tell the sender we don't take input.
    NotAccepted,
    /// Anything else while confirmed: log only.
    Acknowledged,
    /// No subscription matches the sender.
    UnknownSender,
}

impl InboundDisposition {
    /// The automated reply to send back, if any.
    pub fn reply_text(&self) -> Option<&'static str> {
        match self {
            Self::NotAccepted | Self::UnknownSender => Some(
                "Sorry, inbound messages are not accepted at this time. \
                 Reply YES if you'd like to receive the daily digest.",
            ),
            Self::Confirmed { .. } | Self::AlreadyConfirmed | Self::Acknowledged => None,
        }
    }
}

/// Absolute difference in calendar days between two instants.
///
/// The resend gate compares calendar days, not elapsed hours: a message
/// sent at 23:59 blocks a resend all of the next day, and one sent at
/// 00:01 blocks barely more than a day. Coarse, and intentionally so.
pub fn calendar_day_diff(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (a.date_naive() - b.date_naive()).num_days().abs()
}

/// Tracks opt-in state and drives the confirmation/resend flows.
pub struct OptInTracker {
    store: Arc<Store>,
    notifier: Notifier,
}

impl OptInTracker {
    pub fn new(store: Arc<Store>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Processes one inbound message.
    ///
    /// Logging is unconditional and happens before any state-machine
    /// evaluation: every matching subscription gets a MessageLog row for
    /// the inbound text regardless of its content or the current state.
    pub async fn handle_inbound(
        &self,
        inbound: &InboundSms,
        now: DateTime<Utc>,
    ) -> Result<InboundDisposition, OptInError> {
        let rows = self.store.subscriptions_by_phone(&inbound.from)?;

        for row in &rows {
            self.store.insert_message_log(&NewMessageLog {
                subscription_id: row.id,
                external_id: Some(inbound.external_id.clone()),
                body: inbound.body.clone(),
                segments: inbound.segments,
                direction: MessageDirection::Inbound,
                created_at: now,
            })?;
        }

        if rows.is_empty() {
            info!(from = %inbound.from, "inbound message from unknown number");
            return Ok(InboundDisposition::UnknownSender);
        }

        if !is_opt_in_reply(&inbound.body) {
            let any_pending = rows.iter().any(|row| !row.opt_in);
            return Ok(if any_pending {
                InboundDisposition::NotAccepted
            } else {
                InboundDisposition::Acknowledged
            });
        }

        let newly: Vec<Subscription> = rows.iter().filter(|row| !row.opt_in).cloned().collect();
        self.store.confirm_opt_in_by_phone(&inbound.from)?;

        // Recipient confirmation goes out on every "yes", even a repeat.
        self.send_contact_confirmation(&rows[0], now).await;

        // Owner confirmation only for rows that were still pending.
        for row in &newly {
            self.send_owner_confirmation(row).await;
        }

        if newly.is_empty() {
            Ok(InboundDisposition::AlreadyConfirmed)
        } else {
            info!(
                from = %inbound.from,
                newly_confirmed = newly.len(),
                "subscriber opted in"
            );
            Ok(InboundDisposition::Confirmed {
                newly_confirmed: newly.len(),
            })
        }
    }

    /// Re-sends the opt-in request to a pending subscriber.
    ///
    /// Allowed only when the most recent MessageLog row for the subscriber
    /// is more than one calendar day old.
    pub async fn resend_opt_in(
        &self,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), OptInError> {
        let subscription = self
            .store
            .subscription(subscription_id)?
            .ok_or(OptInError::UnknownSubscription(subscription_id))?;

        if let Some(last) = self.store.last_message_log_at(subscription_id)?
            && calendar_day_diff(now, last) <= 1
        {
            return Err(OptInError::CooldownActive {
                last_message_at: last,
            });
        }

        let payload = self.payload_for(&subscription)?;
        let address = ContactAddress {
            phone: Some(subscription.phone.clone()),
            email: subscription.email.clone(),
        };

        let receipt = self
            .notifier
            .contact(
                NotificationKey::ContactOptInRequest,
                subscription.channel,
                &address,
                &payload,
            )
            .await?;

        self.log_outbound(
            subscription.id,
            &render(NotificationKey::ContactOptInRequest, &payload).body,
            receipt,
            now,
        )?;

        info!(subscription = subscription_id, "resent opt-in request");
        Ok(())
    }

    /// Appends an outbound MessageLog row for a send this tracker made.
    pub fn log_outbound(
        &self,
        subscription_id: i64,
        body: &str,
        receipt: Option<SmsReceipt>,
        now: DateTime<Utc>,
    ) -> Result<(), OptInError> {
        let (external_id, segments) = match receipt {
            Some(r) => (Some(r.external_id), r.segments),
            None => (None, 1),
        };
        self.store.insert_message_log(&NewMessageLog {
            subscription_id,
            external_id,
            body: body.to_string(),
            segments,
            direction: MessageDirection::Outbound,
            created_at: now,
        })?;
        Ok(())
    }

    fn payload_for(&self, subscription: &Subscription) -> Result<NotificationPayload, OptInError> {
        let owner_name = self
            .store
            .owner(&subscription.owner_id)?
            .map(|owner| owner.full_name)
            .unwrap_or_else(|| subscription.owner_id.clone());

        Ok(NotificationPayload {
            owner_name,
            contact_name: subscription.full_name.clone(),
            workspace_name: subscription.workspace_id.clone(),
            digest_body: None,
        })
    }

    /// Confirmation sends are fire-and-forget: a messaging hiccup must not
    /// fail the webhook that carried the "yes".
    async fn send_contact_confirmation(&self, subscription: &Subscription, now: DateTime<Utc>) {
        let payload = match self.payload_for(subscription) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "skipping contact confirmation");
                return;
            }
        };
        let address = ContactAddress {
            phone: Some(subscription.phone.clone()),
            email: subscription.email.clone(),
        };

        match self
            .notifier
            .contact(
                NotificationKey::ContactOptInConfirmation,
                famdigest_core::DeliveryChannel::Sms,
                &address,
                &payload,
            )
            .await
        {
            Ok(receipt) => {
                let body = render(NotificationKey::ContactOptInConfirmation, &payload).body;
                if let Err(e) = self.log_outbound(subscription.id, &body, receipt, now) {
                    warn!(error = %e, "failed to log contact confirmation");
                }
            }
            Err(e) => warn!(error = %e, "contact confirmation send failed"),
        }
    }

    async fn send_owner_confirmation(&self, subscription: &Subscription) {
        let owner = match self.store.owner(&subscription.owner_id) {
            Ok(owner) => owner,
            Err(e) => {
                warn!(error = %e, "skipping owner confirmation");
                return;
            }
        };

        let Some(owner) = owner else {
            warn!(
                owner = %subscription.owner_id,
                "no owner directory entry, skipping owner confirmation"
            );
            return;
        };
        let Some(email) = owner.email.clone() else {
            warn!(owner = %owner.id, "owner has no email, skipping confirmation");
            return;
        };

        let payload = NotificationPayload {
            owner_name: owner.full_name,
            contact_name: subscription.full_name.clone(),
            workspace_name: subscription.workspace_id.clone(),
            digest_body: None,
        };

        if let Err(e) = self
            .notifier
            .owner(
                NotificationKey::OwnerSubscriberOptInConfirmation,
                &email,
                &payload,
            )
            .await
        {
            warn!(error = %e, "owner confirmation send failed");
        }
    }
}

/// The lenient opt-in match: any message whose text contains "yes".
fn is_opt_in_reply(body: &str) -> bool {
    body.to_lowercase().contains("yes")
}
