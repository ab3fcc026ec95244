//! Schema-checked decoding of structured agent answers

use super::{InvocationError, RoleConfig};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };

    // Drop the info string ("json") on the opening line
    match body.split_once('\n') {
        Some((info, content)) if info.trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            content.trim()
        }
        _ => body.trim(),
    }
}

/// Validate `text` against the role's schema, then deserialize it
pub fn parse_structured<T: DeserializeOwned>(role: &RoleConfig, text: &str) -> Result<T, InvocationError> {
    let schema = role.output_shape.schema().ok_or_else(|| {
        InvocationError::validation(&role.name, "role does not declare a structured output")
    })?;

    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(InvocationError::validation(&role.name, "empty answer"));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| InvocationError::validation(&role.name, format!("answer is not JSON: {e}")))?;

    let validator = jsonschema::validator_for(schema).map_err(|e| {
        InvocationError::validation(&role.name, format!("schema compilation error: {e}"))
    })?;

    validator.validate(&value).map_err(|errors| {
        let error_messages: Vec<String> = errors
            .map(|e| format!("at '{}': {}", e.instance_path, e))
            .collect();
        InvocationError::validation(&role.name, error_messages.join("; "))
    })?;

    serde_json::from_value(value).map_err(|e| InvocationError::validation(&role.name, e.to_string()))
}
