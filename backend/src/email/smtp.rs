//! SMTP delivery via lettre.

use async_trait::async_trait;
use cv_mcp_types::SendEmailRequest;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{EmailError, EmailReceipt, EmailSender};
use crate::config::EmailConfig;

/// Sends mail through an authenticated SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpMailer {
    /// Build a mailer from complete settings.
    ///
    /// `secure = true` uses implicit TLS, otherwise the connection is
    /// upgraded with STARTTLS.
    pub fn from_config(config: &EmailConfig) -> Result<Self, EmailError> {
        let missing = config.missing_settings();
        let (host, user, pass) = match (&config.host, &config.user, &config.pass) {
            (Some(host), Some(user), Some(pass)) if missing.is_empty() => (host, user, pass),
            _ => {
                return Err(EmailError::NotConfigured {
                    missing: missing.join(", "),
                })
            }
        };

        let from = parse_mailbox(config.from.as_deref().unwrap_or(user))?;

        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(user.clone(), pass.clone()))
            .timeout(Some(config.timeout()))
            .build();

        info!(
            "Email config: host={}, port={}, secure={}, user={}",
            host, config.port, config.secure, user
        );

        Ok(Self {
            transport,
            host: host.clone(),
            from,
            timeout: config.timeout(),
        })
    }

    fn message_id(&self) -> String {
        let domain = self.from.email.domain();
        format!("<{}@{}>", Uuid::new_v4(), domain)
    }

    async fn deliver(&self, email: &SendEmailRequest) -> Result<EmailReceipt, EmailError> {
        let to = parse_mailbox(&email.recipient)?;
        let message_id = self.message_id();
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;

        if !self.transport.test_connection().await? {
            return Err(EmailError::ConnectionRejected(self.host.clone()));
        }
        debug!("SMTP connection to {} verified", self.host);

        let response = self.transport.send(message).await?;
        let lines: Vec<&str> = response.message().collect();
        Ok(EmailReceipt {
            message_id,
            response: format!("{} {}", response.code(), lines.join(" ")),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    async fn send(&self, email: &SendEmailRequest) -> Result<EmailReceipt, EmailError> {
        let result = match tokio::time::timeout(self.timeout, self.deliver(email)).await {
            Ok(result) => result,
            Err(_) => Err(EmailError::Timeout(self.timeout.as_secs())),
        };
        match &result {
            Ok(receipt) => info!("Email sent successfully: {}", receipt.message_id),
            Err(e) => error!("Email sending failed: {}", e),
        }
        result
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| EmailError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
