//! Mock implementations for testing
//!
//! Scripted stand-ins for the model provider, the agent invocation capability
//! and the mailer, so the pipeline can be exercised without network access.

use crate::agents::instructions::{EMAIL_AGENT, PLANNER_AGENT, SEARCH_AGENT, WRITER_AGENT};
use crate::agents::{AgentInvoker, AgentOutput, InvocationError, RoleConfig, ToolInvocation};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
    ToolCall,
};
use crate::mail::{Mailer, OutgoingEmail, SendError, SendReceipt};
use crate::tools::builtin::send_email::SEND_EMAIL_TOOL;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock LLM provider that replays responses in order, cycling at the end
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<CompletionResponse>,
    pub should_fail: bool,
    current_response: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    /// Plain text answers
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(Self::text_response).collect())
    }

    pub fn scripted(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn text_response(content: impl Into<String>) -> CompletionResponse {
        CompletionResponse {
            content: Some(content.into()),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            tool_calls: None,
            metadata: HashMap::new(),
        }
    }

    pub fn tool_call_response(tool_calls: Vec<ToolCall>) -> CompletionResponse {
        CompletionResponse {
            content: None,
            finish_reason: FinishReason::ToolCalls,
            tool_calls: Some(tool_calls),
            ..Self::text_response("")
        }
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.current_response.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);
        let index = self.current_response.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        Ok(self
            .responses
            .get(index % self.responses.len().max(1))
            .cloned()
            .unwrap_or_else(|| Self::text_response("Mock response")))
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed("Mock health check failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Mock agent invocation capability
///
/// Answers each of the four research roles with a well-formed default:
/// a three-directive plan, `"Summary for <query>"` per search, a report
/// addressed to the requested recipient, and a successful `send_email` call.
/// Builders override individual roles.
#[derive(Debug, Default)]
pub struct MockAgentInvoker {
    plan: Option<Vec<(String, String)>>,
    responses: HashMap<String, String>,
    failing_roles: HashSet<String>,
    failing_searches: HashSet<String>,
    report_recipient: Option<String>,
    rejected_send_status: Option<u16>,
    search_delay: Option<Duration>,

    inputs: Mutex<Vec<(String, String)>>,
    calls: std::sync::Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
    searches_in_flight: AtomicUsize,
    max_searches_in_flight: AtomicUsize,
}

impl MockAgentInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Planner returns these `(reason, query)` directives
    pub fn with_plan(mut self, directives: &[(&str, &str)]) -> Self {
        self.plan = Some(
            directives
                .iter()
                .map(|(reason, query)| (reason.to_string(), query.to_string()))
                .collect(),
        );
        self
    }

    /// Raw answer text for a role, bypassing the defaults
    pub fn with_response(mut self, role_name: &str, text: &str) -> Self {
        self.responses.insert(role_name.to_string(), text.to_string());
        self
    }

    /// Every invocation of the role fails with a model error
    pub fn failing_role(mut self, role_name: &str) -> Self {
        self.failing_roles.insert(role_name.to_string());
        self
    }

    /// Search units for this query fail
    pub fn failing_search(mut self, query: &str) -> Self {
        self.failing_searches.insert(query.to_string());
        self
    }

    /// Writer echoes this address instead of the requested one
    pub fn with_report_recipient(mut self, recipient: &str) -> Self {
        self.report_recipient = Some(recipient.to_string());
        self
    }

    /// The email agent's `send_email` call fails with this provider status
    pub fn rejecting_send(mut self, status: u16) -> Self {
        self.rejected_send_status = Some(status);
        self
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    pub async fn inputs_for(&self, role_name: &str) -> Vec<String> {
        self.inputs
            .lock()
            .await
            .iter()
            .filter(|(role, _)| role == role_name)
            .map(|(_, input)| input.clone())
            .collect()
    }

    pub fn calls_for(&self, role_name: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(role_name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_searches(&self) -> usize {
        self.max_searches_in_flight.load(Ordering::SeqCst)
    }

    fn line_value<'a>(input: &'a str, prefix: &str) -> &'a str {
        input
            .lines()
            .find_map(|line| line.strip_prefix(prefix))
            .unwrap_or_default()
            .trim()
    }

    fn plan_answer(&self) -> String {
        let directives = self.plan.clone().unwrap_or_else(|| {
            (1..=3)
                .map(|i| (format!("reason {i}"), format!("query {i}")))
                .collect()
        });
        let searches: Vec<_> = directives
            .iter()
            .map(|(reason, query)| json!({"reason": reason, "query": query}))
            .collect();
        json!({ "searches": searches }).to_string()
    }

    async fn search_answer(&self, input: &str) -> Result<AgentOutput, InvocationError> {
        let in_flight = self.searches_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_searches_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        self.searches_in_flight.fetch_sub(1, Ordering::SeqCst);

        let query = Self::line_value(input, "Search term:");
        if self.failing_searches.contains(query) {
            return Err(InvocationError::model(SEARCH_AGENT, format!("search for '{query}' failed")));
        }
        Ok(AgentOutput::text(format!("Summary for {query}")))
    }

    fn report_answer(&self, input: &str) -> String {
        let recipient = self
            .report_recipient
            .clone()
            .unwrap_or_else(|| Self::line_value(input, "Receiver email id:").to_string());
        let findings = Self::line_value(input, "Summarized search results:");

        json!({
            "short_summary": "Mock summary.",
            "markdown_body": format!("# Banking Bytes\n\nFindings: {findings}"),
            "recipient": recipient,
            "follow_ups": ["What next?"]
        })
        .to_string()
    }

    fn email_answer(&self, input: &str) -> AgentOutput {
        let recipient = Self::line_value(input, "Recipient email id:");
        let arguments = json!({
            "subject": "Banking Bytes",
            "html_body": "<h1>Banking Bytes</h1>",
            "to_email": recipient
        });

        let invocation = match self.rejected_send_status {
            Some(status) => ToolInvocation::failed(
                SEND_EMAIL_TOOL,
                arguments,
                format!("Mail provider rejected the message with status {status}"),
            ),
            None => ToolInvocation::succeeded(
                SEND_EMAIL_TOOL,
                arguments,
                json!({"status": "success", "status_code": 202}),
            ),
        };
        AgentOutput::text("Email sent").with_tool_call(invocation)
    }
}

#[async_trait]
impl AgentInvoker for MockAgentInvoker {
    async fn invoke(&self, role: &RoleConfig, input: &str) -> Result<AgentOutput, InvocationError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(role.name.clone()).or_insert(0) += 1;
        }
        self.inputs
            .lock()
            .await
            .push((role.name.clone(), input.to_string()));

        if self.failing_roles.contains(&role.name) {
            return Err(InvocationError::model(&role.name, "Mock agent failure"));
        }
        if let Some(text) = self.responses.get(&role.name) {
            return Ok(AgentOutput::text(text.clone()));
        }

        match role.name.as_str() {
            PLANNER_AGENT => Ok(AgentOutput::text(self.plan_answer())),
            SEARCH_AGENT => self.search_answer(input).await,
            WRITER_AGENT => Ok(AgentOutput::text(self.report_answer(input))),
            EMAIL_AGENT => Ok(self.email_answer(input)),
            _ => Ok(AgentOutput::text("Mock response")),
        }
    }
}

/// Mock mailer recording every email it accepts
#[derive(Debug, Default)]
pub struct MockMailer {
    rejected_status: Option<u16>,
    attempts: AtomicUsize,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails as if the provider answered with `status`
    pub fn rejecting(status: u16) -> Self {
        Self {
            rejected_status: Some(status),
            ..Default::default()
        }
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }

    /// Every send call, accepted or rejected
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<SendReceipt, SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.rejected_status {
            return Err(SendError::Rejected {
                status,
                body: "mock rejection".to_string(),
            });
        }

        self.sent.lock().await.push(email.clone());
        Ok(SendReceipt {
            status_code: 202,
            message_id: Some(format!("mock-{}", uuid::Uuid::new_v4())),
        })
    }
}
