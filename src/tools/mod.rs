//! Tool system used by agents
//!
//! Tools are registered once at startup and shared read-only by every agent
//! invocation, including the concurrent search units. Parameters are checked
//! against each tool's JSON schema before execution.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod builtin;

/// Tool interface
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON schema of the parameters
    fn describe(&self) -> ToolDescription;

    /// Run the tool; parameters have already been validated against the schema
    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError>;
}

/// Tool description offered to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Registry of tools available to agents
#[derive(Default)]
pub struct ToolSystem {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the name it describes itself with
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let description = tool.describe();
        jsonschema::validator_for(&description.parameters).map_err(|e| {
            ToolError::SchemaError(format!("Schema for '{}' does not compile: {e}", description.name))
        })?;

        if self.tools.contains_key(&description.name) {
            return Err(ToolError::DuplicateTool(description.name));
        }
        self.tools.insert(description.name, tool);
        Ok(())
    }

    /// Builder-style registration
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self, ToolError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.tools.contains_key(tool_name)
    }

    pub fn describe_tool(&self, tool_name: &str) -> Option<ToolDescription> {
        self.tools.get(tool_name).map(|tool| tool.describe())
    }

    /// Descriptions for the named tools that are registered; unknown names are skipped
    pub fn describe_tools(&self, tool_names: &[String]) -> Vec<ToolDescription> {
        tool_names
            .iter()
            .filter_map(|name| self.describe_tool(name))
            .collect()
    }

    /// Execute tool with validated parameters
    pub async fn execute_tool(&self, tool_name: &str, parameters: &Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        Self::validate_parameters(&tool.describe(), parameters)?;

        tool.execute(parameters).await
    }

    fn validate_parameters(description: &ToolDescription, parameters: &Value) -> Result<(), ToolError> {
        let validator = jsonschema::validator_for(&description.parameters)
            .map_err(|e| ToolError::SchemaError(format!("Schema compilation error: {e}")))?;

        validator.validate(parameters).map_err(|errors| {
            let error_messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            ToolError::ValidationError(error_messages.join("; "))
        })
    }

    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Tool system errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
    #[error("Tool initialization failed: {0}")]
    InitializationError(String),
    #[error("Parameter validation failed: {0}")]
    ValidationError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}
