//! Agent invocation capability
//!
//! Every stage asks an agent for something through [`AgentInvoker`]: a role
//! configuration plus an input string in, the agent's final answer and a
//! record of its tool calls out. [`LlmAgentRunner`] is the production
//! implementation; tests script the capability directly.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod instructions;
pub mod role;
pub mod runner;
pub mod structured;

pub use instructions::ResearchRoles;
pub use role::{OutputShape, RoleConfig, ToolPolicy};
pub use runner::{LlmAgentRunner, RunnerSettings};

/// Ask one agent for an answer
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, role: &RoleConfig, input: &str) -> Result<AgentOutput, InvocationError>;
}

/// Final answer of one invocation plus every tool call made on the way
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

impl AgentOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_call(mut self, invocation: ToolInvocation) -> Self {
        self.tool_calls.push(invocation);
        self
    }

    /// Successful calls to the named tool
    pub fn successful_calls<'a>(&'a self, tool_name: &'a str) -> impl Iterator<Item = &'a ToolInvocation> {
        self.tool_calls
            .iter()
            .filter(move |call| call.name == tool_name && call.is_success())
    }
}

/// One executed tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolInvocation {
    pub fn succeeded(name: impl Into<String>, arguments: Value, result: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, arguments: Value, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// String argument by name
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(Value::as_str)
    }
}

/// Failures at the invocation boundary
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvocationError {
    /// The model call failed or the agent could not finish
    #[error("Agent '{agent}' failed: {message}")]
    Model { agent: String, message: String },

    /// The agent answered but the answer does not fit the role's schema
    #[error("Agent '{agent}' returned malformed output: {message}")]
    Validation { agent: String, message: String },
}

impl InvocationError {
    pub fn model(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Model {
            agent: agent.into(),
            message: message.into(),
        }
    }

    pub fn validation(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            agent: agent.into(),
            message: message.into(),
        }
    }
}

/// Invoke a structured-output role and decode its answer into `T`
pub async fn invoke_structured<T: DeserializeOwned>(
    invoker: &dyn AgentInvoker,
    role: &RoleConfig,
    input: &str,
) -> Result<T, InvocationError> {
    let output = invoker.invoke(role, input).await?;
    structured::parse_structured(role, &output.text)
}
