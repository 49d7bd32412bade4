//! SMS sending behind the [`SmsSender`] trait.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{DeliveryError, DeliveryResult};

/// A boxed future for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the messaging provider reported about a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsReceipt {
    /// Provider message id (Twilio SID).
    pub external_id: String,
    /// Billable segment count.
    pub segments: u32,
}

/// Sends one SMS to one phone number.
pub trait SmsSender: Send + Sync {
    fn send<'a>(&'a self, to: &'a str, body: &'a str) -> BoxFuture<'a, DeliveryResult<SmsReceipt>>;
}

/// Settings for the Twilio REST client.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// The sending phone number, E.164.
    pub from_number: String,
    pub timeout: Duration,
}

impl TwilioConfig {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Twilio REST API client.
#[derive(Debug, Clone)]
pub struct TwilioSms {
    http: reqwest::Client,
    config: TwilioConfig,
    base_url: String,
}

impl TwilioSms {
    pub fn new(config: TwilioConfig) -> DeliveryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DeliveryError::SendFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            base_url: "https://api.twilio.com".to_string(),
        })
    }

    /// Overrides the API base URL, used by tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send_message(&self, to: &str, body: &str) -> DeliveryResult<SmsReceipt> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.config.account_sid
        );

        debug!(to = %to, "sending sms");

        let params = [
            ("From", self.config.from_number.as_str()),
            ("To", to),
            ("Body", body),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| DeliveryError::SendFailed(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DeliveryError::SendFailed(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(DeliveryError::SendFailed(format!(
                "provider error ({status}): {text}"
            )));
        }

        let parsed: MessageResponse = serde_json::from_str(&text)
            .map_err(|e| DeliveryError::MalformedResponse(format!("{e}: {text}")))?;

        let segments = parsed.segment_count();
        let receipt = SmsReceipt {
            external_id: parsed.sid,
            segments,
        };
        info!(sid = %receipt.external_id, segments = receipt.segments, "sms accepted");
        Ok(receipt)
    }
}

impl SmsSender for TwilioSms {
    fn send<'a>(&'a self, to: &'a str, body: &'a str) -> BoxFuture<'a, DeliveryResult<SmsReceipt>> {
        Box::pin(self.send_message(to, body))
    }
}

/// The fields of Twilio's message resource the digest cares about.
/// `num_segments` arrives as a string.
#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
    num_segments: Option<String>,
}

impl MessageResponse {
    fn segment_count(&self) -> u32 {
        self.num_segments
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1)
    }
}
