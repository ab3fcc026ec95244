//! Error types for the research pipeline
//!
//! Stage failures are classified the way the orchestrator propagates them:
//! model failures and malformed structured output are fatal for planning and
//! synthesis, send failures are fatal for delivery. Search unit failures never
//! reach this type; they are converted to absent findings at the task boundary.

use crate::agents::InvocationError;
use crate::research::PipelineState;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for research pipeline operations
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Model error during {stage}: {message}")]
    ModelError {
        stage: PipelineState,
        message: String,
    },

    #[error("Validation error during {stage}: {message}")]
    ValidationError {
        stage: PipelineState,
        message: String,
    },

    #[error("Send error: {message}")]
    SendError { message: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ResearchError {
    /// Create model error for a stage
    pub fn model_error<S: Into<String>>(stage: PipelineState, message: S) -> Self {
        Self::ModelError {
            stage,
            message: message.into(),
        }
    }

    /// Create validation error for a stage
    pub fn validation_error<S: Into<String>>(stage: PipelineState, message: S) -> Self {
        Self::ValidationError {
            stage,
            message: message.into(),
        }
    }

    /// Create send error
    pub fn send_error<S: Into<String>>(message: S) -> Self {
        Self::SendError {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Attribute an invocation failure to the stage that made the call
    pub fn from_invocation(stage: PipelineState, error: InvocationError) -> Self {
        match error {
            InvocationError::Model { .. } => Self::model_error(stage, error.to_string()),
            InvocationError::Validation { .. } => Self::validation_error(stage, error.to_string()),
        }
    }

    /// Stage in which the failure happened, when it is attributable to one
    pub fn stage(&self) -> Option<PipelineState> {
        match self {
            ResearchError::ModelError { stage, .. }
            | ResearchError::ValidationError { stage, .. } => Some(*stage),
            ResearchError::SendError { .. } => Some(PipelineState::Sending),
            ResearchError::ConfigError(_) | ResearchError::InternalError { .. } => None,
        }
    }

    /// Short machine-readable kind used in failure events and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchError::ModelError { .. } => "model_error",
            ResearchError::ValidationError { .. } => "validation_error",
            ResearchError::SendError { .. } => "send_error",
            ResearchError::ConfigError(_) => "config_error",
            ResearchError::InternalError { .. } => "internal_error",
        }
    }

    /// Failure description that is safe to show to the progress observer
    pub fn to_failure_description(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|key|secret|bearer)[=:]\s*\S+").ok());

static SENSITIVE_PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+").ok()
});

const MAX_FAILURE_DESCRIPTION_LEN: usize = 500;

/// Sanitize error messages before they leave the process
pub(crate) fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(re) = SECRET_PATTERN.as_ref() {
        sanitized = re.replace_all(&sanitized, "${1}=***").to_string();
    }

    if let Some(re) = SENSITIVE_PATH_PATTERN.as_ref() {
        sanitized = re.replace_all(&sanitized, "/***REDACTED***/").to_string();
    }

    if sanitized.len() > MAX_FAILURE_DESCRIPTION_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_FAILURE_DESCRIPTION_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for research operations
pub type ResearchResult<T> = Result<T, ResearchError>;
