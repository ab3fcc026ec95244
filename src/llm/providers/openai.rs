//! Chat-completions provider
//!
//! Speaks the OpenAI chat-completions protocol. Gemini exposes the same
//! protocol under its own base URL, so one implementation serves both.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    MessageRole, ResponseFormat, TokenUsage, ToolCall,
};
use crate::tools::ToolDescription;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Chat-completions provider configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Name reported by [`LlmProvider::name`]
    pub provider_name: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            provider_name: "openai".to_string(),
        }
    }
}

impl OpenAiConfig {
    /// Configuration for Gemini's OpenAI-compatible endpoint
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            provider_name: "gemini".to_string(),
            ..Default::default()
        }
    }
}

/// Chat-completions provider implementation
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: Client,
}

const BACKOFF_DELAYS_MS: [u64; 3] = [100, 200, 300];

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::NotConfigured(format!(
                "{} API key is required",
                config.provider_name
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn convert_message(message: &Message) -> OpenAiMessage {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        let tool_calls = message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| OpenAiToolCall {
                    id: call.id.clone(),
                    call_type: "function".to_string(),
                    function: OpenAiFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect()
        });

        // Assistant turns that only carry tool calls have no content
        let content = if message.content.is_empty() && tool_calls.is_some() {
            None
        } else {
            Some(message.content.clone())
        };

        OpenAiMessage {
            role: role.to_string(),
            content,
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }

    fn convert_tool(tool_desc: &ToolDescription) -> OpenAiTool {
        OpenAiTool {
            tool_type: "function".to_string(),
            function: OpenAiFunction {
                name: tool_desc.name.clone(),
                description: tool_desc.description.clone(),
                parameters: tool_desc.parameters.clone(),
            },
        }
    }

    fn convert_response_format(format: &ResponseFormat) -> OpenAiResponseFormat {
        match format {
            ResponseFormat::Text => OpenAiResponseFormat::Simple {
                format_type: "text".to_string(),
            },
            ResponseFormat::Json => OpenAiResponseFormat::Simple {
                format_type: "json_object".to_string(),
            },
            ResponseFormat::JsonSchema { json_schema } => OpenAiResponseFormat::JsonSchema {
                format_type: "json_schema".to_string(),
                json_schema: OpenAiJsonSchema {
                    name: json_schema.name.clone(),
                    strict: json_schema.strict,
                    schema: json_schema.schema.clone(),
                },
            },
        }
    }

    fn convert_request(request: &CompletionRequest) -> OpenAiCompletionRequest {
        let tools = request
            .tools
            .as_ref()
            .filter(|tools| !tools.is_empty())
            .map(|tools| tools.iter().map(Self::convert_tool).collect::<Vec<_>>());

        // tool_choice without tools is rejected by the API
        let tool_choice = tools.as_ref().and(request.tool_choice.clone());

        OpenAiCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
            tool_choice,
            response_format: request
                .response_format
                .as_ref()
                .map(Self::convert_response_format),
        }
    }

    fn parse_completion_response(
        response: OpenAiCompletionResponse,
        metadata: HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices returned".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let tool_calls = choice
            .message
            .tool_calls
            .as_deref()
            .map(Self::extract_tool_calls)
            .filter(|calls| !calls.is_empty());

        Ok(CompletionResponse {
            content: choice.message.content,
            model: response.model,
            usage,
            finish_reason: Self::convert_finish_reason(choice.finish_reason.as_deref()),
            tool_calls,
            metadata,
        })
    }

    fn extract_tool_calls(calls: &[OpenAiToolCall]) -> Vec<ToolCall> {
        calls
            .iter()
            .filter_map(|call| {
                match serde_json::from_str::<serde_json::Value>(&call.function.arguments) {
                    Ok(arguments) => Some(ToolCall {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments,
                    }),
                    Err(e) => {
                        error!(tool = %call.function.name, "Failed to parse tool call arguments: {}", e);
                        None
                    }
                }
            })
            .collect()
    }

    fn convert_finish_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> LlmError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                LlmError::AuthenticationFailed(format!("{status} - {body}"))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                LlmError::RateLimitExceeded(format!("{status} - {body}"))
            }
            s if s.is_server_error() => LlmError::ApiError(format!("server error: {s} - {body}")),
            s => LlmError::ApiError(format!("{s} - {body}")),
        }
    }

    fn should_retry(error: &LlmError) -> bool {
        match error {
            LlmError::NetworkError(_) | LlmError::RateLimitExceeded(_) => true,
            LlmError::ApiError(msg) => msg.starts_with("server error"),
            _ => false,
        }
    }

    async fn complete_with_retry(
        &self,
        request: &OpenAiCompletionRequest,
        metadata: HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        let mut last_error = None;

        for (attempt, delay_ms) in std::iter::once(0u64)
            .chain(BACKOFF_DELAYS_MS.iter().copied())
            .enumerate()
        {
            if attempt > 0 {
                debug!(provider = %self.config.provider_name, attempt, delay_ms, "Retrying completion");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.make_api_request(request).await {
                Ok(raw) => {
                    let response = Self::parse_completion_response(raw, metadata)?;
                    debug!(
                        provider = %self.config.provider_name,
                        total_tokens = response.usage.total_tokens,
                        finish_reason = ?response.finish_reason,
                        tool_calls = response.tool_calls.as_ref().map(|c| c.len()).unwrap_or(0),
                        "Completion received"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(provider = %self.config.provider_name, attempt = attempt + 1, "Completion attempt failed: {}", e);
                    if !Self::should_retry(&e) {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        error!(provider = %self.config.provider_name, "Completion failed after all retries");
        Err(last_error
            .unwrap_or_else(|| LlmError::NetworkError("All retry attempts failed".to_string())))
    }

    async fn make_api_request(
        &self,
        request: &OpenAiCompletionRequest,
    ) -> Result<OpenAiCompletionResponse, LlmError> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                LlmError::NetworkError(format!(
                    "HTTP request failed: {} (is_connect: {}, is_timeout: {})",
                    e,
                    e.is_connect(),
                    e.is_timeout()
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let openai_request = Self::convert_request(&request);
        debug!(
            provider = %self.config.provider_name,
            model = %openai_request.model,
            messages = openai_request.messages.len(),
            tools = openai_request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "Sending completion request"
        );
        self.complete_with_retry(&openai_request, request.metadata)
            .await
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::AuthenticationFailed(format!(
                "{} API health check returned {}",
                self.config.provider_name,
                response.status()
            )))
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "default_call_type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum OpenAiResponseFormat {
    Simple {
        #[serde(rename = "type")]
        format_type: String,
    },
    JsonSchema {
        #[serde(rename = "type")]
        format_type: String,
        json_schema: OpenAiJsonSchema,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiJsonSchema {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    strict: Option<bool>,
    schema: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::JsonSchemaDefinition;
    use serde_json::json;

    fn request_with(messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            messages,
            model: "gemini-2.0-flash".to_string(),
            max_tokens: None,
            temperature: Some(0.2),
            tools: None,
            tool_choice: Some("required".to_string()),
            response_format: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_provider_creation_without_api_key() {
        let result = OpenAiProvider::new(OpenAiConfig::default());
        assert!(matches!(result, Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_gemini_config() {
        let config = OpenAiConfig::gemini("key");
        assert_eq!(config.provider_name, "gemini");
        assert!(config.base_url.contains("generativelanguage.googleapis.com"));

        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider
            .endpoint("chat/completions")
            .ends_with("/v1beta/openai/chat/completions"));
    }

    #[test]
    fn test_tool_choice_dropped_without_tools() {
        let request = request_with(vec![Message::user("hello")]);
        let converted = OpenAiProvider::convert_request(&request);
        assert!(converted.tools.is_none());
        assert!(converted.tool_choice.is_none());

        let json = serde_json::to_string(&converted).unwrap();
        assert!(!json.contains("tool_choice"));
        assert!(json.contains("\"temperature\":0.2"));
    }

    #[test]
    fn test_tool_turns_round_trip_into_wire_format() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "send_email".to_string(),
            arguments: json!({"subject": "Banking Bytes"}),
        };
        let assistant = OpenAiProvider::convert_message(&Message::assistant("", Some(vec![call])));
        assert_eq!(assistant.role, "assistant");
        assert!(assistant.content.is_none());
        let calls = assistant.tool_calls.unwrap();
        assert_eq!(calls[0].function.arguments, "{\"subject\":\"Banking Bytes\"}");

        let tool = OpenAiProvider::convert_message(&Message::tool_result("call_1", "ok"));
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_json_schema_response_format() {
        let mut request = request_with(vec![Message::user("plan")]);
        request.response_format = Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaDefinition {
                name: "SearchPlan".to_string(),
                strict: None,
                schema: json!({"type": "object"}),
            },
        });

        let json = serde_json::to_value(OpenAiProvider::convert_request(&request)).unwrap();
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["response_format"]["json_schema"]["name"], "SearchPlan");
        assert!(json["response_format"]["json_schema"].get("strict").is_none());
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let raw: OpenAiCompletionResponse = serde_json::from_value(json!({
            "model": "gemini-2.0-flash",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "web_search", "arguments": "{\"query\":\"ECB rates\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let response = OpenAiProvider::parse_completion_response(raw, HashMap::new()).unwrap();
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage.total_tokens, 0);
        let calls = response.tool_calls.unwrap();
        assert_eq!(calls[0].name, "web_search");
        assert_eq!(calls[0].arguments["query"], "ECB rates");
    }

    #[test]
    fn test_parse_response_without_choices() {
        let raw: OpenAiCompletionResponse =
            serde_json::from_value(json!({"model": "m", "choices": []})).unwrap();
        let result = OpenAiProvider::parse_completion_response(raw, HashMap::new());
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_malformed_tool_arguments_are_dropped() {
        let calls = vec![OpenAiToolCall {
            id: "call_1".to_string(),
            call_type: "function".to_string(),
            function: OpenAiFunctionCall {
                name: "web_search".to_string(),
                arguments: "{not json".to_string(),
            },
        }];
        assert!(OpenAiProvider::extract_tool_calls(&calls).is_empty());
    }

    #[test]
    fn test_status_classification_and_retry() {
        let auth = OpenAiProvider::classify_status(StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(auth, LlmError::AuthenticationFailed(_)));
        assert!(!OpenAiProvider::should_retry(&auth));

        let limited = OpenAiProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(OpenAiProvider::should_retry(&limited));

        let server = OpenAiProvider::classify_status(StatusCode::BAD_GATEWAY, "");
        assert!(OpenAiProvider::should_retry(&server));

        let client = OpenAiProvider::classify_status(StatusCode::BAD_REQUEST, "");
        assert!(!OpenAiProvider::should_retry(&client));
    }

    #[test]
    fn test_finish_reason_conversion() {
        assert_eq!(OpenAiProvider::convert_finish_reason(Some("stop")), FinishReason::Stop);
        assert_eq!(OpenAiProvider::convert_finish_reason(Some("length")), FinishReason::Length);
        assert_eq!(OpenAiProvider::convert_finish_reason(None), FinishReason::Error);
    }
}
