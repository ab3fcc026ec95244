//! Role configuration: the immutable description of one agent
//!
//! A role is built once at startup and shared by reference with every
//! invocation. Nothing about it changes at runtime.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::{json, Value};

/// Expected shape of an agent's final answer
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape {
    PlainText,
    Structured { name: String, schema: Value },
}

impl OutputShape {
    /// Structured output whose schema is derived from `T`
    ///
    /// Subschemas are inlined because several OpenAI-compatible backends
    /// reject `$ref` in response schemas.
    pub fn structured<T: JsonSchema>(name: impl Into<String>) -> Self {
        let settings = SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        });
        let root = settings.into_generator().into_root_schema_for::<T>();
        let schema = serde_json::to_value(root).unwrap_or_else(|_| json!({"type": "object"}));

        Self::Structured {
            name: name.into(),
            schema,
        }
    }

    pub fn schema(&self) -> Option<&Value> {
        match self {
            OutputShape::PlainText => None,
            OutputShape::Structured { schema, .. } => Some(schema),
        }
    }
}

/// Whether the agent must call one of its tools before answering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolPolicy {
    #[default]
    None,
    RequiredToolUse,
}

/// One agent: instructions, answer shape and tool access
#[derive(Debug, Clone, PartialEq)]
pub struct RoleConfig {
    pub name: String,
    pub instructions: String,
    pub output_shape: OutputShape,
    pub tool_policy: ToolPolicy,
    /// Names of the tools this agent may call
    pub tools: Vec<String>,
}

impl RoleConfig {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            output_shape: OutputShape::PlainText,
            tool_policy: ToolPolicy::None,
            tools: Vec::new(),
        }
    }

    pub fn with_output(mut self, output_shape: OutputShape) -> Self {
        self.output_shape = output_shape;
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.tools.push(tool_name.into());
        self
    }

    pub fn with_tool_policy(mut self, tool_policy: ToolPolicy) -> Self {
        self.tool_policy = tool_policy;
        self
    }

    pub fn allows_tool(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t == tool_name)
    }
}
