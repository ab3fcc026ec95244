//! Configuration for the research pipeline
//!
//! Every section is optional: with no file at all the pipeline runs against
//! Gemini's OpenAI-compatible endpoint and SendGrid, reading credentials from
//! the environment. Secrets are never stored in the file, only the names of
//! the environment variables that hold them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResearchConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub research: ResearchSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub email: EmailSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// Language model backend
///
/// `model`, `base_url` and `api_key_env` fall back to defaults for the
/// chosen provider when unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// "gemini" or "openai"; both speak the chat-completions protocol
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable containing the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            api_key_env: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Defaults for one chat-completions backend
struct ProviderDefaults {
    model: &'static str,
    base_url: &'static str,
    api_key_env: &'static str,
}

const GEMINI_DEFAULTS: ProviderDefaults = ProviderDefaults {
    model: "gemini-2.0-flash",
    base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
    api_key_env: "GOOGLE_API_KEY",
};

const OPENAI_DEFAULTS: ProviderDefaults = ProviderDefaults {
    model: "gpt-4o-mini",
    base_url: "https://api.openai.com/v1",
    api_key_env: "OPENAI_API_KEY",
};

impl LlmSection {
    fn provider_defaults(&self) -> &'static ProviderDefaults {
        match self.provider.as_str() {
            "openai" => &OPENAI_DEFAULTS,
            _ => &GEMINI_DEFAULTS,
        }
    }

    /// Model name, configured or the provider's default
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or(self.provider_defaults().model)
    }

    /// Endpoint, configured or the provider's default
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(self.provider_defaults().base_url)
    }

    /// API key variable name, configured or the provider's default
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or(self.provider_defaults().api_key_env)
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

/// Where Delivery takes the recipient address from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecipientSource {
    /// The address echoed back in the writer's structured report
    #[default]
    Report,
    /// The address the caller typed in; the report's copy is advisory
    Caller,
}

/// Pipeline shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchSection {
    /// Number of searches the planner is asked for
    #[serde(default = "default_no_of_searches")]
    pub no_of_searches: usize,
    /// Cap on in-flight search units; unset means one task per directive
    pub max_concurrent_searches: Option<usize>,
    #[serde(default)]
    pub recipient_source: RecipientSource,
    /// Tool-call rounds an agent may take before it is considered stuck
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            no_of_searches: default_no_of_searches(),
            max_concurrent_searches: None,
            recipient_source: RecipientSource::default(),
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

fn default_no_of_searches() -> usize {
    4
}

fn default_max_tool_iterations() -> usize {
    6
}

/// Web search tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_search_api_key_env(),
            max_results: default_max_results(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_search_api_key_env() -> String {
    "SERPER_API_KEY".to_string()
}

fn default_max_results() -> usize {
    5
}

/// Email delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailSection {
    #[serde(default = "default_email_api_key_env")]
    pub api_key_env: String,
    /// Verified sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_email_base_url")]
    pub base_url: String,
    /// Heading the email agent puts on every report
    #[serde(default = "default_heading")]
    pub heading: String,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            api_key_env: default_email_api_key_env(),
            from_address: default_from_address(),
            base_url: default_email_base_url(),
            heading: default_heading(),
        }
    }
}

fn default_email_api_key_env() -> String {
    "SENDGRID_API_KEY".to_string()
}

fn default_from_address() -> String {
    "reports@banking-bytes.local".to_string()
}

fn default_email_base_url() -> String {
    "https://api.sendgrid.com/v3".to_string()
}

fn default_heading() -> String {
    "Banking Bytes".to_string()
}

/// Web form server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

const SUPPORTED_PROVIDERS: &[&str] = &["gemini", "openai"];

impl ResearchConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ResearchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider '{}', expected one of: {}",
                self.llm.provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        for (name, value) in [
            ("llm.base_url", self.llm.base_url()),
            ("email.base_url", self.email.base_url.as_str()),
        ] {
            url::Url::parse(value).map_err(|e| {
                ConfigError::InvalidConfig(format!("{name} '{value}' is not a valid URL: {e}"))
            })?;
        }

        if self.research.no_of_searches == 0 {
            return Err(ConfigError::InvalidConfig(
                "research.no_of_searches must be at least 1".to_string(),
            ));
        }

        if self.research.max_concurrent_searches == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "research.max_concurrent_searches must be at least 1 when set".to_string(),
            ));
        }

        if self.research.max_tool_iterations == 0 {
            return Err(ConfigError::InvalidConfig(
                "research.max_tool_iterations must be at least 1".to_string(),
            ));
        }

        if self.email.from_address.trim().is_empty() || !self.email.from_address.contains('@') {
            return Err(ConfigError::InvalidConfig(
                "email.from_address must be an email address".to_string(),
            ));
        }

        Ok(())
    }

    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// LLM API key from the configured environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(self.llm.api_key_env())
    }

    /// Email delivery API key from the configured environment variable
    pub fn get_email_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.email.api_key_env)
    }

    /// Web search API key; absent means the search role runs without the tool
    pub fn get_search_api_key(&self) -> Option<String> {
        if !self.search.enabled {
            return None;
        }
        Self::get_env_var_required(&self.search.api_key_env).ok()
    }
}
