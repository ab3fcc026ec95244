//! Test helpers and utilities for integration tests

use banking_bytes::agents::ResearchRoles;
use banking_bytes::config::RecipientSource;
use banking_bytes::progress::ProgressEvent;
use banking_bytes::research::{PipelineSettings, ResearchManager};
use banking_bytes::testing::MockAgentInvoker;
use std::sync::Arc;

#[allow(dead_code)]
pub const RECIPIENT: &str = "reader@example.com";

/// Manager over a mock invoker; the invoker is returned for call inspection
#[allow(dead_code)]
pub fn mock_manager(invoker: MockAgentInvoker) -> (ResearchManager, Arc<MockAgentInvoker>) {
    manager_with(invoker, PipelineSettings::default())
}

#[allow(dead_code)]
pub fn manager_with(
    invoker: MockAgentInvoker,
    settings: PipelineSettings,
) -> (ResearchManager, Arc<MockAgentInvoker>) {
    let invoker = Arc::new(invoker);
    let manager = ResearchManager::new(
        invoker.clone(),
        ResearchRoles::new(3, "Banking Bytes", false),
        settings,
    );
    (manager, invoker)
}

#[allow(dead_code)]
pub fn caller_settings() -> PipelineSettings {
    PipelineSettings {
        max_concurrent_searches: None,
        recipient_source: RecipientSource::Caller,
    }
}

/// Events that are not terminal, as display text
#[allow(dead_code)]
pub fn status_texts(events: &[ProgressEvent]) -> Vec<String> {
    events
        .iter()
        .filter(|e| !e.is_terminal())
        .map(|e| e.display_text().to_string())
        .collect()
}
