//! Outgoing email for account flows.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Development sender: writes the message to the log instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(to = %message.to, subject = %message.subject, body = %message.body, "Email (dev mode, not sent)");
        Ok(())
    }
}

/// SMTP sender using STARTTLS.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpEmailSender {
    pub fn from_config(config: &gm_config::EmailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| PlatformError::configuration(format!("Invalid SMTP host: {}", e)))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        info!(host = %config.smtp_host, port = config.smtp_port, "SMTP email sender configured");
        Ok(Self {
            transport: builder.build(),
            from: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e| PlatformError::configuration(format!("Invalid from address: {}", e)))?)
            .to(message.to.parse().map_err(|e| PlatformError::validation(format!("Invalid recipient: {}", e)))?)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| PlatformError::internal(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| PlatformError::internal(format!("SMTP send failed: {}", e)))?;
        Ok(())
    }
}

/// Build the sender selected by configuration.
pub fn sender_from_config(config: &gm_config::EmailConfig) -> Result<Arc<dyn EmailSender>> {
    if config.dev_mode || config.smtp_host.is_empty() {
        Ok(Arc::new(LoggingEmailSender))
    } else {
        Ok(Arc::new(SmtpEmailSender::from_config(config)?))
    }
}
