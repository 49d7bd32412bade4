//! Delivery error types.

use thiserror::Error;

/// A failure sending one outbound message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The messaging provider rejected or never received the send.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The destination address is missing or unusable for the channel.
    #[error("invalid destination: {0}")]
    InvalidAddress(String),

    /// The provider answered in a shape we could not parse.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// A specialized Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
