//! Email sending behind the [`EmailSender`] trait.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use crate::error::{DeliveryError, DeliveryResult};
use crate::sms::BoxFuture;

/// Sends one email to one address.
pub trait EmailSender: Send + Sync {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, DeliveryResult<()>>;
}

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// The From address, e.g. `"FamDigest <digest@famdigest.example>"`.
    pub from_address: String,
}

impl SmtpConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        from_address: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            from_address: from_address.into(),
        }
    }
}

/// lettre-backed SMTP sender.
pub struct SmtpEmail {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmail {
    pub fn new(config: SmtpConfig) -> DeliveryResult<Self> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| DeliveryError::InvalidAddress(format!("from address: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| DeliveryError::SendFailed(format!("smtp relay setup failed: {e}")))?
            .credentials(Credentials::new(config.username, config.password))
            .build();

        Ok(Self { transport, from })
    }

    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> DeliveryResult<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| DeliveryError::InvalidAddress(format!("recipient address: {e}")))?;

        debug!(to = %to, subject = %subject, "sending email");

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| DeliveryError::SendFailed(format!("failed to build message: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DeliveryError::SendFailed(format!("smtp send failed: {e}")))?;

        info!("email accepted by relay");
        Ok(())
    }
}

impl EmailSender for SmtpEmail {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, DeliveryResult<()>> {
        Box::pin(self.send_mail(to, subject, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_from_address() {
        let config = SmtpConfig::new("smtp.example.com", "user", "pass", "not an address");
        assert!(matches!(
            SmtpEmail::new(config),
            Err(DeliveryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn accepts_named_from_address() {
        let config = SmtpConfig::new(
            "smtp.example.com",
            "user",
            "pass",
            "FamDigest <digest@famdigest.example>",
        );
        assert!(SmtpEmail::new(config).is_ok());
    }
}
