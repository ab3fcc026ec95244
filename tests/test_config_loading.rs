//! Configuration loading and validation tests
//!
//! Tests focus on observable outcomes of loading a file from disk; field-level
//! parsing is covered next to the config types.

use banking_bytes::agents::{ResearchRoles, RunnerSettings};
use banking_bytes::config::{ConfigError, RecipientSource, ResearchConfig};
use banking_bytes::research::PipelineSettings;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[test]
fn test_config_loads_successfully_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[llm]
provider = "gemini"
model = "gemini-2.0-flash"
temperature = 0.2

[research]
no_of_searches = 3
max_concurrent_searches = 2
recipient_source = "caller"
max_tool_iterations = 4

[email]
from_address = "desk@example.com"
heading = "Banking Bytes Weekly"
"#
    )
    .unwrap();

    let config = ResearchConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.research.no_of_searches, 3);
    assert_eq!(config.email.heading, "Banking Bytes Weekly");

    let settings = PipelineSettings::from_config(&config);
    assert_eq!(settings.max_concurrent_searches, Some(2));
    assert_eq!(settings.recipient_source, RecipientSource::Caller);

    let runner = RunnerSettings::from_config(&config);
    assert_eq!(runner.max_tool_iterations, 4);
    assert_eq!(runner.temperature, Some(0.2));

    let roles = ResearchRoles::from_config(&config, true);
    assert!(roles.planner.instructions.contains("Output 3 terms"));
    assert!(roles.search.allows_tool("web_search"));
    assert!(roles.email.instructions.contains("Banking Bytes Weekly"));
}

#[test]
fn test_missing_file_is_read_error() {
    let result = ResearchConfig::load_from_file(Path::new("/definitely/not/here.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_invalid_values_in_file_are_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[research]\nmax_tool_iterations = 0").unwrap();

    let result = ResearchConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(msg)) if msg.contains("max_tool_iterations")));
}

#[test]
fn test_openai_provider_uses_openai_endpoint_and_key() {
    let config =
        ResearchConfig::from_toml_str("[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"").unwrap();

    assert_eq!(config.llm.base_url(), "https://api.openai.com/v1");
    assert_eq!(config.llm.api_key_env(), "OPENAI_API_KEY");

    std::env::set_var("OPENAI_API_KEY", "openai-secret");
    assert_eq!(config.get_llm_api_key().unwrap(), "openai-secret");
}

#[test]
fn test_shown_config_loads_back() {
    let mut config = ResearchConfig::default();
    config.research.max_concurrent_searches = Some(3);
    config.email.from_address = "desk@example.com".to_string();

    let rendered = toml::to_string_pretty(&config).unwrap();
    let reloaded = ResearchConfig::from_toml_str(&rendered).unwrap();

    assert_eq!(reloaded, config);
}

#[test]
fn test_api_keys_come_from_named_env_vars() {
    std::env::set_var("BANKING_BYTES_TEST_LLM_KEY", "llm-secret");
    std::env::set_var("BANKING_BYTES_TEST_SEARCH_KEY", "  ");

    let mut config = ResearchConfig::default();
    config.llm.api_key_env = Some("BANKING_BYTES_TEST_LLM_KEY".to_string());
    config.search.api_key_env = "BANKING_BYTES_TEST_SEARCH_KEY".to_string();
    config.email.api_key_env = "BANKING_BYTES_TEST_MISSING_MAIL_KEY".to_string();

    assert_eq!(config.get_llm_api_key().unwrap(), "llm-secret");
    assert!(config.get_search_api_key().is_none());
    assert!(matches!(
        config.get_email_api_key(),
        Err(ConfigError::EnvVarNotFound(name)) if name == "BANKING_BYTES_TEST_MISSING_MAIL_KEY"
    ));
}
