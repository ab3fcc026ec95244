//! Banking Bytes - command line entry point
//!
//! `serve` runs the web form, `research` runs a single query from the
//! terminal, `config` validates (and optionally prints) the configuration.

use banking_bytes::agents::{LlmAgentRunner, ResearchRoles, RunnerSettings};
use banking_bytes::config::ResearchConfig;
use banking_bytes::llm::provider::LlmProvider;
use banking_bytes::llm::providers::{OpenAiConfig, OpenAiProvider};
use banking_bytes::mail::{SendGridConfig, SendGridMailer};
use banking_bytes::observability::init_default_logging;
use banking_bytes::progress::ProgressPayload;
use banking_bytes::research::{PipelineSettings, ResearchManager};
use banking_bytes::tools::builtin::{SendEmailTool, WebSearchTool};
use banking_bytes::tools::ToolSystem;
use banking_bytes::web;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Banking Bytes research pipeline
#[derive(Parser)]
#[command(name = "banking-bytes")]
#[command(about = "Plan, search, write and email a research report")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "BANKING_BYTES_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web form
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Run one query and print progress to the terminal
    Research {
        #[arg(short, long)]
        query: String,
        /// Recipient of the report
        #[arg(short, long)]
        email: String,
    },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting Banking Bytes v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { addr } => serve(config, addr).await,
        Commands::Research { query, email } => research(config, query, email).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ResearchConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(ResearchConfig::load_from_file(path)?);
    }

    for path_str in ["banking-bytes.toml", "config/banking-bytes.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(ResearchConfig::load_from_file(&path)?);
        }
    }

    info!("No configuration file found, using defaults");
    let config = ResearchConfig::default();
    config.validate()?;
    Ok(config)
}

/// Creates the chat-completions provider for the configured backend
struct LlmProviderFactory;

impl LlmProviderFactory {
    fn create_provider(
        config: &ResearchConfig,
    ) -> Result<Arc<dyn LlmProvider>, Box<dyn std::error::Error>> {
        let api_key = config.get_llm_api_key()?;
        let base = match config.llm.provider.as_str() {
            "gemini" => OpenAiConfig::gemini(api_key),
            "openai" => OpenAiConfig {
                api_key,
                ..Default::default()
            },
            provider => return Err(format!("Unsupported LLM provider: {provider}").into()),
        };

        let provider = OpenAiProvider::new(OpenAiConfig {
            base_url: config.llm.base_url().to_string(),
            timeout: Duration::from_secs(config.llm.timeout_secs),
            ..base
        })?;
        Ok(Arc::new(provider))
    }
}

/// Registers the send-email tool and, when a key is present, web search
fn build_tools(config: &ResearchConfig) -> Result<(ToolSystem, bool), Box<dyn std::error::Error>> {
    let mailer = SendGridMailer::new(SendGridConfig {
        api_key: config.get_email_api_key()?,
        base_url: config.email.base_url.clone(),
        from_address: config.email.from_address.clone(),
        ..Default::default()
    })?;

    let mut tools = ToolSystem::new();
    tools.register(Arc::new(SendEmailTool::new(Arc::new(mailer))))?;

    let web_search_available = match config.get_search_api_key() {
        Some(key) => {
            tools.register(Arc::new(WebSearchTool::new(key, config.search.max_results)?))?;
            true
        }
        None => {
            warn!(
                env = %config.search.api_key_env,
                "Web search disabled; search summaries will come from the model alone"
            );
            false
        }
    };

    Ok((tools, web_search_available))
}

fn build_manager(config: &ResearchConfig) -> Result<ResearchManager, Box<dyn std::error::Error>> {
    let provider = LlmProviderFactory::create_provider(config)?;
    let (tools, web_search_available) = build_tools(config)?;
    info!(
        provider = %provider.name(),
        model = %config.llm.model(),
        tools = ?tools.list_tools(),
        "Pipeline assembled"
    );

    let runner = LlmAgentRunner::new(
        provider,
        Arc::new(tools),
        RunnerSettings::from_config(config),
    );
    Ok(ResearchManager::new(
        Arc::new(runner),
        ResearchRoles::from_config(config, web_search_available),
        PipelineSettings::from_config(config),
    ))
}

async fn serve(
    config: ResearchConfig,
    addr: Option<SocketAddr>,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = build_manager(&config)?;
    let addr = match addr {
        Some(addr) => addr,
        None => format!("{}:{}", config.server.host, config.server.port).parse()?,
    };

    web::serve(manager, addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received interrupt, shutting down gracefully...");
    })
    .await?;
    Ok(())
}

async fn research(
    config: ResearchConfig,
    query: String,
    email: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = build_manager(&config)?;
    let mut events = manager.run(query, email);

    while let Some(event) = events.next().await {
        match &event.payload {
            ProgressPayload::Status(message) => println!("{message}"),
            ProgressPayload::Report(markdown) => println!("\n{markdown}"),
            ProgressPayload::Failure { kind, description } => {
                return Err(format!("{kind}: {description}").into());
            }
        }
    }
    Ok(())
}

fn handle_config_command(
    config: &ResearchConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
