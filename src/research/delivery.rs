//! Delivery stage
//!
//! The email agent turns the markdown report into HTML and calls the
//! `send_email` tool. The stage succeeds only if at least one of those calls
//! went through; it never retries.

use super::{DeliveryResult, ReportArtifact};
use crate::agents::{AgentInvoker, AgentOutput, RoleConfig, ToolInvocation};
use crate::error::{ResearchError, ResearchResult};
use crate::observability::metrics;
use crate::tools::builtin::send_email::SEND_EMAIL_TOOL;
use tracing::{info, warn};

fn delivery_input(report: &ReportArtifact) -> String {
    format!(
        "{}\n\nRecipient email id: {}",
        report.markdown_body, report.recipient
    )
}

fn delivery_result(call: &ToolInvocation, fallback_recipient: &str) -> DeliveryResult {
    DeliveryResult {
        recipient: call.argument("to_email").unwrap_or(fallback_recipient).to_string(),
        subject: call.argument("subject").unwrap_or_default().to_string(),
        status_code: call
            .result
            .as_ref()
            .and_then(|r| r.get("status_code"))
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok()),
    }
}

/// Inspect what the email agent did and decide whether the email went out
fn verify_sent(report: &ReportArtifact, output: &AgentOutput) -> ResearchResult<DeliveryResult> {
    let sent: Vec<&ToolInvocation> = output.successful_calls(SEND_EMAIL_TOOL).collect();

    let Some(first) = sent.first() else {
        let reason = output
            .tool_calls
            .iter()
            .rev()
            .find_map(|call| call.error.clone())
            .unwrap_or_else(|| "email agent finished without sending".to_string());
        return Err(ResearchError::send_error(reason));
    };

    for _ in &sent {
        metrics().email_sent();
    }
    if sent.len() > 1 {
        warn!(count = sent.len(), "Email agent sent more than one email");
    }

    let result = delivery_result(first, &report.recipient);
    if !result.recipient.trim().eq_ignore_ascii_case(report.recipient.trim()) {
        warn!(
            expected = %report.recipient,
            actual = %result.recipient,
            "Email agent addressed a different recipient"
        );
    }
    Ok(result)
}

/// Hand the report to the email agent
pub async fn deliver(
    invoker: &dyn AgentInvoker,
    role: &RoleConfig,
    report: &ReportArtifact,
) -> ResearchResult<DeliveryResult> {
    info!(recipient = %report.recipient, "Writing email");

    let output = invoker
        .invoke(role, &delivery_input(report))
        .await
        .map_err(|e| ResearchError::send_error(e.to_string()))?;

    let result = verify_sent(report, &output)?;
    info!(recipient = %result.recipient, status = ?result.status_code, "Email sent");
    Ok(result)
}
