//! `send_email` tool handed to the delivery agent

use crate::mail::{Mailer, OutgoingEmail};
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const SEND_EMAIL_TOOL: &str = "send_email";

pub struct SendEmailTool {
    mailer: Arc<dyn Mailer>,
}

impl SendEmailTool {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    fn parse_email(parameters: &Value) -> Result<OutgoingEmail, ToolError> {
        let field = |name: &str| {
            parameters
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ToolError::ExecutionError(format!("Missing parameter '{name}'")))
        };

        Ok(OutgoingEmail {
            subject: field("subject")?,
            html_body: field("html_body")?,
            recipient: field("to_email")?,
        })
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: SEND_EMAIL_TOOL.to_string(),
            description: "Send an email with the given subject and HTML body to the given recipient"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "subject": {"type": "string", "minLength": 1},
                    "html_body": {"type": "string", "minLength": 1},
                    "to_email": {"type": "string", "minLength": 3}
                },
                "required": ["subject", "html_body", "to_email"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let email = Self::parse_email(parameters)?;
        info!(recipient = %email.recipient, subject = %email.subject, "Sending email");

        let receipt = self
            .mailer
            .send(&email)
            .await
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?;

        info!(status = receipt.status_code, "Email response");
        Ok(json!({"status": "success", "status_code": receipt.status_code}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockMailer;

    fn params() -> Value {
        json!({
            "subject": "Banking Bytes: Deposits",
            "html_body": "<h1>Banking Bytes</h1>",
            "to_email": "reader@example.com"
        })
    }

    #[tokio::test]
    async fn test_send_success_reports_status() {
        let mailer = Arc::new(MockMailer::new());
        let tool = SendEmailTool::new(mailer.clone());

        let result = tool.execute(&params()).await.unwrap();
        assert_eq!(result["status"], "success");

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "reader@example.com");
    }

    #[tokio::test]
    async fn test_send_failure_is_tool_error() {
        let tool = SendEmailTool::new(Arc::new(MockMailer::rejecting(401)));
        let result = tool.execute(&params()).await;
        assert!(matches!(result, Err(ToolError::ExecutionError(msg)) if msg.contains("401")));
    }

    #[test]
    fn test_missing_parameter() {
        let result = SendEmailTool::parse_email(&json!({"subject": "s", "html_body": "b"}));
        assert!(matches!(result, Err(ToolError::ExecutionError(_))));
    }
}
