use serde::{Deserialize, Serialize};
use tracing::info;

/// Rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Outbound mail transport (SMTP relay, provider API, or a test double).
pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Transport that records each message in the service log.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::Rejected("no recipients".to_string()));
        }

        info!(
            from = %self.from,
            to = ?message.to,
            subject = %message.subject,
            bytes = message.html.len(),
            "email dispatched"
        );
        Ok(())
    }
}
