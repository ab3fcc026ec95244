//! SendGrid v3 mailer

use super::{Mailer, OutgoingEmail, SendError, SendReceipt};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub base_url: String,
    pub from_address: String,
    pub timeout: Duration,
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.sendgrid.com/v3".to_string(),
            from_address: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct SendGridMailer {
    config: SendGridConfig,
    client: Client,
}

impl SendGridMailer {
    pub fn new(config: SendGridConfig) -> Result<Self, SendError> {
        if config.api_key.trim().is_empty() {
            return Err(SendError::NotConfigured(
                "SendGrid API key is required".to_string(),
            ));
        }
        if !super::is_plausible_address(&config.from_address) {
            return Err(SendError::NotConfigured(format!(
                "sender '{}' is not an email address",
                config.from_address
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SendError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn build_payload(&self, email: &OutgoingEmail) -> Value {
        json!({
            "personalizations": [{"to": [{"email": email.recipient.trim()}]}],
            "from": {"email": self.config.from_address},
            "subject": email.subject,
            "content": [{"type": "text/html", "value": email.html_body}]
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, SendError> {
        email.validate()?;

        let response = self
            .client
            .post(format!(
                "{}/mail/send",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&self.build_payload(email))
            .send()
            .await
            .map_err(|e| SendError::NetworkError(e.to_string()))?;

        let status = response.status();
        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "SendGrid rejected email");
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), message_id = ?message_id, "SendGrid accepted email");
        Ok(SendReceipt {
            status_code: status.as_u16(),
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SendGridConfig {
        SendGridConfig {
            api_key: "SG.test".to_string(),
            from_address: "desk@example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_api_key_and_sender() {
        let missing_key = SendGridConfig {
            api_key: String::new(),
            ..config()
        };
        assert!(matches!(
            SendGridMailer::new(missing_key),
            Err(SendError::NotConfigured(_))
        ));

        let bad_sender = SendGridConfig {
            from_address: "desk".to_string(),
            ..config()
        };
        assert!(SendGridMailer::new(bad_sender).is_err());
    }

    #[test]
    fn test_payload_shape() {
        let mailer = SendGridMailer::new(config()).unwrap();
        let payload = mailer.build_payload(&OutgoingEmail {
            subject: "Banking Bytes".to_string(),
            html_body: "<p>hi</p>".to_string(),
            recipient: " reader@example.com ".to_string(),
        });

        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "reader@example.com");
        assert_eq!(payload["from"]["email"], "desk@example.com");
        assert_eq!(payload["content"][0]["type"], "text/html");
        assert_eq!(payload["content"][0]["value"], "<p>hi</p>");
    }
}
