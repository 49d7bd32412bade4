//! The inbound messaging webhook.
//!
//! Receives the messaging provider's form-encoded callback, validates its
//! shape at the boundary, and hands the message to the opt-in tracker.
//! The response is provider markup: a `<Message>` reply when the state
//! machine wants to answer, an empty `<Response>` otherwise.

use std::sync::Arc;

use axum::Form;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use chrono::Utc;
use famdigest_delivery::{InboundSms, twiml};
use serde::Deserialize;
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;

/// Twilio's inbound form fields, all optional so validation stays ours.
#[derive(Debug, Deserialize)]
pub struct InboundSmsForm {
    #[serde(rename = "From")]
    from: Option<String>,
    #[serde(rename = "Body")]
    body: Option<String>,
    #[serde(rename = "MessageSid")]
    message_sid: Option<String>,
    #[serde(rename = "NumSegments")]
    num_segments: Option<String>,
}

impl InboundSmsForm {
    /// Boundary validation: a malformed payload is rejected before any
    /// processing, so no MessageLog row is written for it.
    fn validate(self) -> Result<InboundSms, ApiError> {
        let from = require(self.from, "From")?;
        let body = require(self.body, "Body")?;
        let message_sid = require(self.message_sid, "MessageSid")?;
        let segments = self
            .num_segments
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Ok(InboundSms {
            from,
            body,
            external_id: message_sid,
            segments,
        })
    }
}

fn require(field: Option<String>, name: &'static str) -> Result<String, ApiError> {
    field
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("missing field {name}")))
}

pub async fn inbound_sms(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InboundSmsForm>,
) -> Result<impl IntoResponse, ApiError> {
    let inbound = form.validate()?;
    debug!(from = %inbound.from, sid = %inbound.external_id, "inbound sms");

    let disposition = state.tracker.handle_inbound(&inbound, Utc::now()).await?;

    let xml = match disposition.reply_text() {
        Some(reply) => twiml::reply(reply),
        None => twiml::empty(),
    };

    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}
