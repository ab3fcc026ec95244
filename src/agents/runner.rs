//! LLM-backed agent runner
//!
//! Runs one role against an [`LlmProvider`] with a bounded tool loop: offer
//! the role's tools, execute what the model asks for, feed the results back,
//! and stop at the first answer without tool calls.

use super::{
    AgentInvoker, AgentOutput, InvocationError, OutputShape, RoleConfig, ToolInvocation,
    ToolPolicy,
};
use crate::config::ResearchConfig;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, JsonSchemaDefinition, LlmProvider, Message,
    ResponseFormat, ToolCall,
};
use crate::observability::metrics;
use crate::tools::{ToolDescription, ToolSystem};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Model settings shared by every role
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_tool_iterations: usize,
}

impl RunnerSettings {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            model: config.llm.model().to_string(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            max_tool_iterations: config.research.max_tool_iterations,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&ResearchConfig::default())
    }
}

/// Stateless runner; safe to share across concurrent search units
pub struct LlmAgentRunner {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolSystem>,
    settings: RunnerSettings,
}

impl LlmAgentRunner {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolSystem>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    pub fn tools(&self) -> &ToolSystem {
        &self.tools
    }

    fn build_initial_messages(role: &RoleConfig, input: &str) -> Vec<Message> {
        let now = chrono::Utc::now();
        let system_prompt = format!(
            "{}\n\nCurrent date: {}",
            role.instructions,
            now.format("%Y-%m-%d")
        );

        vec![Message::system(system_prompt), Message::user(input)]
    }

    fn response_format(role: &RoleConfig) -> Option<ResponseFormat> {
        match &role.output_shape {
            OutputShape::PlainText => None,
            OutputShape::Structured { name, schema } => Some(ResponseFormat::JsonSchema {
                json_schema: JsonSchemaDefinition {
                    name: name.clone(),
                    strict: None,
                    schema: schema.clone(),
                },
            }),
        }
    }

    /// `tool_choice` for the next round
    ///
    /// A required-tool role is forced to call a tool until it has attempted
    /// one of its tools, then forbidden from calling more so it answers.
    /// A failed attempt closes the tools too; delivery is never retried.
    fn tool_choice(
        role: &RoleConfig,
        offered: &[ToolDescription],
        invocations: &[ToolInvocation],
    ) -> Option<String> {
        if offered.is_empty() {
            return None;
        }
        match role.tool_policy {
            ToolPolicy::None => Some("auto".to_string()),
            ToolPolicy::RequiredToolUse
                if invocations.iter().any(|call| role.allows_tool(&call.name)) =>
            {
                Some("none".to_string())
            }
            ToolPolicy::RequiredToolUse => Some("required".to_string()),
        }
    }

    fn build_request(
        &self,
        role: &RoleConfig,
        messages: &[Message],
        offered: &[ToolDescription],
        tool_choice: Option<String>,
    ) -> CompletionRequest {
        let mut metadata = HashMap::new();
        metadata.insert("agent".to_string(), role.name.clone());

        CompletionRequest {
            messages: messages.to_vec(),
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: if offered.is_empty() { None } else { Some(offered.to_vec()) },
            tool_choice,
            response_format: Self::response_format(role),
            metadata,
        }
    }

    async fn execute_tool_call(&self, role: &RoleConfig, call: &ToolCall) -> ToolInvocation {
        if !role.allows_tool(&call.name) {
            warn!(agent = %role.name, tool = %call.name, "Model requested a tool outside its role");
            return ToolInvocation::failed(
                &call.name,
                call.arguments.clone(),
                format!("tool '{}' is not available to this agent", call.name),
            );
        }

        debug!(agent = %role.name, tool = %call.name, args = %call.arguments, "Executing tool");
        let start = Instant::now();
        let outcome = self.tools.execute_tool(&call.name, &call.arguments).await;
        metrics().tool_executed(&call.name, start.elapsed(), outcome.is_ok());

        match outcome {
            Ok(result) => ToolInvocation::succeeded(&call.name, call.arguments.clone(), result),
            Err(e) => {
                warn!(agent = %role.name, tool = %call.name, error = %e, "Tool call failed");
                ToolInvocation::failed(&call.name, call.arguments.clone(), e.to_string())
            }
        }
    }

    fn tool_result_content(invocation: &ToolInvocation) -> String {
        match (&invocation.result, &invocation.error) {
            (Some(result), _) => result.to_string(),
            (None, Some(error)) => format!("Error: {error}"),
            (None, None) => String::new(),
        }
    }

    fn finish(
        role: &RoleConfig,
        response: CompletionResponse,
        invocations: Vec<ToolInvocation>,
    ) -> Result<AgentOutput, InvocationError> {
        if role.tool_policy == ToolPolicy::RequiredToolUse && invocations.is_empty() {
            return Err(InvocationError::model(
                &role.name,
                "finished without calling a required tool",
            ));
        }

        Ok(AgentOutput {
            text: response.content.unwrap_or_default(),
            tool_calls: invocations,
        })
    }

    async fn run_tool_loop(
        &self,
        role: &RoleConfig,
        input: &str,
    ) -> Result<AgentOutput, InvocationError> {
        let offered = self.tools.describe_tools(&role.tools);
        if role.tool_policy == ToolPolicy::RequiredToolUse && offered.is_empty() {
            return Err(InvocationError::model(
                &role.name,
                "role requires tool use but none of its tools are registered",
            ));
        }

        let mut messages = Self::build_initial_messages(role, input);
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for iteration in 1..=self.settings.max_tool_iterations {
            let tool_choice = Self::tool_choice(role, &offered, &invocations);
            let tools_closed = tool_choice.as_deref() == Some("none");
            let request = self.build_request(role, &messages, &offered, tool_choice);

            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|e| InvocationError::model(&role.name, e.to_string()))?;

            let tool_calls = match &response.tool_calls {
                Some(calls) if !calls.is_empty() && !tools_closed => calls.clone(),
                Some(calls) if !calls.is_empty() => {
                    warn!(
                        agent = %role.name,
                        ignored = calls.len(),
                        "Ignoring tool calls after the required tool was attempted"
                    );
                    return Self::finish(role, response, invocations);
                }
                _ => {
                    info!(agent = %role.name, iterations = iteration, "Agent finished");
                    return Self::finish(role, response, invocations);
                }
            };

            debug!(
                agent = %role.name,
                iteration = iteration,
                tool_count = tool_calls.len(),
                "Processing tool calls"
            );

            messages.push(Message::assistant(
                response.content.clone().unwrap_or_default(),
                Some(tool_calls.clone()),
            ));
            for call in &tool_calls {
                let invocation = self.execute_tool_call(role, call).await;
                messages.push(Message::tool_result(&call.id, Self::tool_result_content(&invocation)));
                invocations.push(invocation);
            }
        }

        Err(InvocationError::model(
            &role.name,
            format!(
                "tool execution exceeded maximum iterations ({})",
                self.settings.max_tool_iterations
            ),
        ))
    }
}

#[async_trait]
impl AgentInvoker for LlmAgentRunner {
    async fn invoke(&self, role: &RoleConfig, input: &str) -> Result<AgentOutput, InvocationError> {
        let span = tracing::info_span!("agent", agent = %role.name, provider = %self.provider.name());
        self.run_tool_loop(role, input).instrument(span).await
    }
}
