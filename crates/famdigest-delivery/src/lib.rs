//! Delivery for famdigest: senders, keyed notifications, opt-in tracking,
//! and webhook reply markup.

pub mod email;
pub mod error;
pub mod notify;
pub mod optin;
pub mod sms;
pub mod twiml;

pub use email::{EmailSender, SmtpConfig, SmtpEmail};
pub use error::{DeliveryError, DeliveryResult};
pub use notify::{
    ContactAddress, NotificationKey, NotificationPayload, Notifier, RenderedNotification, render,
};
pub use optin::{InboundDisposition, InboundSms, OptInError, OptInTracker, calendar_day_diff};
pub use sms::{BoxFuture, SmsReceipt, SmsSender, TwilioConfig, TwilioSms};
