//! Banking Bytes - deep research pipeline
//!
//! Turns one research query into an emailed report:
//! - a planner agent produces a structured list of web searches
//! - search agents run every planned search concurrently and summarize results
//! - a writer agent synthesizes a long-form markdown report
//! - an email agent converts the report to HTML and sends it
//!
//! Each run yields an ordered stream of progress events ending in exactly one
//! terminal event: the final report, or a single failure.
//!
//! # Quick Start
//!
//! ```rust
//! use banking_bytes::agents::ResearchRoles;
//! use banking_bytes::research::{PipelineSettings, ResearchManager};
//! use banking_bytes::testing::MockAgentInvoker;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let manager = ResearchManager::new(
//!     Arc::new(MockAgentInvoker::new()),
//!     ResearchRoles::new(3, "Banking Bytes", false),
//!     PipelineSettings::default(),
//! );
//!
//! let events = manager
//!     .run("Open banking adoption in 2025", "reader@example.com")
//!     .collect_all()
//!     .await;
//! assert!(events.last().is_some_and(|e| e.is_terminal()));
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod observability;
pub mod progress;
pub mod research;
pub mod testing;
pub mod tools;
pub mod web;

pub use agents::{AgentInvoker, AgentOutput, InvocationError, ResearchRoles, RoleConfig};
pub use config::{ConfigError, ResearchConfig};
pub use error::{ResearchError, ResearchResult};
pub use progress::{ProgressEvent, ProgressPayload, ProgressStream};
pub use research::{
    DeliveryResult, FindingsSet, PipelineState, ReportArtifact, ResearchManager, SearchDirective,
    SearchPlan,
};
pub use tools::{Tool, ToolDescription, ToolError, ToolSystem};
