//! Web search tool backed by the Serper API
//!
//! This is the search execution capability handed to the search agent. The
//! agent decides what to query; the tool only returns compact result records.

use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

pub const WEB_SEARCH_TOOL: &str = "web_search";

const SERPER_BASE_URL: &str = "https://google.serper.dev";

/// Web search tool using Serper
pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>, max_results: usize) -> Result<Self, ToolError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ToolError::InitializationError(
                "Serper API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ToolError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: SERPER_BASE_URL.to_string(),
            max_results: max_results.max(1),
        })
    }

    /// Point the tool at a different Serper-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_search_payload(query: &str, num_results: usize) -> Value {
        json!({
            "q": query,
            "num": num_results,
            "gl": "us",
            "hl": "en"
        })
    }

    fn requested_results(parameters: &Value, max_results: usize) -> usize {
        parameters
            .get("num_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(max_results)
            .clamp(1, max_results)
    }

    /// Reduce a Serper response to the answer box (if any) and organic hits
    fn parse_search_response(query: &str, search_result: &Value, num_results: usize) -> Value {
        let answer = search_result
            .get("answerBox")
            .and_then(|a| a.get("answer").or_else(|| a.get("snippet")))
            .and_then(Value::as_str);

        let results: Vec<Value> = search_result
            .get("organic")
            .and_then(Value::as_array)
            .map(|organic| {
                organic
                    .iter()
                    .filter_map(|hit| {
                        let title = hit.get("title").and_then(Value::as_str)?;
                        let link = hit.get("link").and_then(Value::as_str)?;
                        let snippet = hit.get("snippet").and_then(Value::as_str).unwrap_or("");
                        Some(json!({"title": title, "url": link, "snippet": snippet}))
                    })
                    .take(num_results)
                    .collect()
            })
            .unwrap_or_default();

        let mut response = json!({"query": query, "results": results});
        if let Some(answer) = answer {
            response["answer"] = json!(answer);
        }
        response
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: WEB_SEARCH_TOOL.to_string(),
            description: "Search the web and return titles, links and snippets of the top results"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Search query"
                    },
                    "num_results": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 20
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let query = parameters
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::ExecutionError("Query parameter is required".to_string()))?;
        let num_results = Self::requested_results(parameters, self.max_results);

        let response = self
            .client
            .post(format!("{}/search", self.base_url.trim_end_matches('/')))
            .header("X-API-KEY", &self.api_key)
            .json(&Self::build_search_payload(query, num_results))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionError(format!(
                "Serper API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let search_result: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Failed to parse response: {e}")))?;

        Ok(Self::parse_search_response(query, &search_result, num_results))
    }
}
