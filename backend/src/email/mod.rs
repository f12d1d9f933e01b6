//! Outbound email.
//!
//! Capability handlers and REST handlers only see the [`EmailSender`] trait.
//! The production implementation is [`SmtpMailer`]; when SMTP credentials
//! are not configured an [`UnconfiguredMailer`] takes its place so that the
//! configuration error is reported on the first attempted send.

pub mod smtp;

use async_trait::async_trait;
use cv_mcp_types::SendEmailRequest;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::config::EmailConfig;

pub use smtp::SmtpMailer;

/// Result of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailReceipt {
    /// Message-ID header of the sent email
    pub message_id: String,
    /// Final response line from the mail server
    pub response: String,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email is not configured: {missing} must be set")]
    NotConfigured { missing: String },
    #[error("Invalid email address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("SMTP server {0} did not accept the connection")]
    ConnectionRejected(String),
    #[error("Email delivery timed out after {0}s")]
    Timeout(u64),
}

/// Something that can deliver an email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &SendEmailRequest) -> Result<EmailReceipt, EmailError>;
}

/// Stand-in used when SMTP settings are incomplete. Every send fails with
/// [`EmailError::NotConfigured`].
#[derive(Debug, Clone)]
pub struct UnconfiguredMailer {
    missing: String,
}

impl UnconfiguredMailer {
    pub fn new(missing: &[&str]) -> Self {
        Self {
            missing: missing.join(", "),
        }
    }
}

#[async_trait]
impl EmailSender for UnconfiguredMailer {
    async fn send(&self, _email: &SendEmailRequest) -> Result<EmailReceipt, EmailError> {
        Err(EmailError::NotConfigured {
            missing: self.missing.clone(),
        })
    }
}

/// Build the mailer described by `config`.
///
/// Incomplete credentials are an error only when `config.required` is set;
/// otherwise sends fail individually with the configuration error.
pub fn mailer_from_config(config: &EmailConfig) -> Result<Arc<dyn EmailSender>, EmailError> {
    let missing = config.missing_settings();
    if missing.is_empty() {
        return Ok(Arc::new(SmtpMailer::from_config(config)?));
    }

    let mailer = UnconfiguredMailer::new(&missing);
    if config.required {
        return Err(EmailError::NotConfigured {
            missing: mailer.missing,
        });
    }
    warn!(
        "Email is not configured ({} missing) - send-email will fail until it is",
        mailer.missing
    );
    Ok(Arc::new(mailer))
}
