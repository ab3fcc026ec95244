//! Email send capability
//!
//! The delivery agent never talks to the mail provider directly; it calls the
//! `send_email` tool, which hands an [`OutgoingEmail`] to a [`Mailer`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod sendgrid;

pub use sendgrid::{SendGridConfig, SendGridMailer};

/// One HTML email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub subject: String,
    pub html_body: String,
    pub recipient: String,
}

/// Successful hand-off to the mail provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub status_code: u16,
    /// Provider message id when the provider returns one
    pub message_id: Option<String>,
}

/// Send capability
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, SendError>;
}

/// Email delivery errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SendError {
    #[error("Mailer not configured: {0}")]
    NotConfigured(String),
    #[error("Invalid email: {0}")]
    InvalidEmail(String),
    #[error("Mail provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl OutgoingEmail {
    /// Check the fields a provider would otherwise reject
    pub fn validate(&self) -> Result<(), SendError> {
        if self.subject.trim().is_empty() {
            return Err(SendError::InvalidEmail("subject is empty".to_string()));
        }
        if self.html_body.trim().is_empty() {
            return Err(SendError::InvalidEmail("body is empty".to_string()));
        }
        if !is_plausible_address(&self.recipient) {
            return Err(SendError::InvalidEmail(format!(
                "'{}' is not an email address",
                self.recipient
            )));
        }
        Ok(())
    }
}

/// Cheap shape check for an address: one `@`, non-empty local part, dotted domain
pub fn is_plausible_address(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
