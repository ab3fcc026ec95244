//! Research pipeline orchestrator
//!
//! Sequences plan, search, write and deliver for one query, reporting each
//! transition on a [`ProgressStream`]. A run either ends with the report body
//! or with a single failure event; the observer always gets one of the two.

use super::{delivery, planner, search, writer, PipelineState, ReportArtifact};
use crate::agents::{AgentInvoker, ResearchRoles, RoleConfig};
use crate::config::{RecipientSource, ResearchConfig};
use crate::error::{ResearchError, ResearchResult};
use crate::observability::metrics;
use crate::progress::{progress_channel, ProgressPayload, ProgressSender, ProgressStream};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

pub const STATUS_PLANNED: &str = "Searches planned, starting to search...";
pub const STATUS_SEARCHED: &str = "Searches complete, writing report...";
pub const STATUS_WRITTEN: &str = "Report written, sending email...";
pub const STATUS_SENT: &str = "Email sent, research complete";

/// Knobs that shape a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSettings {
    pub max_concurrent_searches: Option<usize>,
    pub recipient_source: RecipientSource,
}

impl PipelineSettings {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            max_concurrent_searches: config.research.max_concurrent_searches,
            recipient_source: config.research.recipient_source,
        }
    }
}

/// Runs the four-stage research pipeline
///
/// Cheap to clone; every run gets its own task and progress channel and
/// shares nothing mutable with other runs.
#[derive(Clone)]
pub struct ResearchManager {
    invoker: Arc<dyn AgentInvoker>,
    planner_role: Arc<RoleConfig>,
    search_role: Arc<RoleConfig>,
    writer_role: Arc<RoleConfig>,
    email_role: Arc<RoleConfig>,
    settings: PipelineSettings,
}

impl ResearchManager {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        roles: ResearchRoles,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            invoker,
            planner_role: Arc::new(roles.planner),
            search_role: Arc::new(roles.search),
            writer_role: Arc::new(roles.writer),
            email_role: Arc::new(roles.email),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Start a run and return its progress stream
    ///
    /// The run proceeds on its own task; dropping the stream does not cancel
    /// it. Must be called from within a tokio runtime.
    pub fn run(&self, query: impl Into<String>, recipient: impl Into<String>) -> ProgressStream {
        let (sender, stream) = progress_channel();
        let manager = self.clone();
        let query = query.into();
        let recipient = recipient.into();
        let span = crate::research_span!(run_id = %Uuid::new_v4());

        tokio::spawn(async move { manager.drive(query, recipient, sender).await }.instrument(span));
        stream
    }

    /// Drive one run to its terminal event
    async fn drive(&self, query: String, recipient: String, mut sender: ProgressSender) {
        info!("Starting research");
        metrics().run_started();
        let start = Instant::now();

        let outcome = AssertUnwindSafe(self.execute(&query, &recipient, &mut sender))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(ResearchError::internal_error("research run aborted")));

        match outcome {
            Ok(report) => {
                metrics().run_completed(start.elapsed());
                info!(events = sender.emitted() + 1, "Research complete");
                sender
                    .emit(PipelineState::Done, ProgressPayload::Report(report.markdown_body))
                    .await;
            }
            Err(e) => {
                metrics().run_failed(e.stage(), start.elapsed());
                error!(error = %e, stage = ?e.stage(), "Research failed");
                sender
                    .emit(
                        PipelineState::Failed,
                        ProgressPayload::Failure {
                            kind: e.kind().to_string(),
                            description: e.to_failure_description(),
                        },
                    )
                    .await;
            }
        }
    }

    async fn execute(
        &self,
        query: &str,
        recipient: &str,
        sender: &mut ProgressSender,
    ) -> ResearchResult<ReportArtifact> {
        let plan = timed(
            PipelineState::Planning,
            planner::plan(self.invoker.as_ref(), &self.planner_role, query),
        )
        .await?;
        sender.status(PipelineState::Planning, STATUS_PLANNED).await;

        let findings = timed(PipelineState::Searching, async {
            Ok(search::search_all(
                Arc::clone(&self.invoker),
                Arc::clone(&self.search_role),
                &plan,
                self.settings.max_concurrent_searches,
            )
            .await)
        })
        .await?;
        sender.status(PipelineState::Searching, STATUS_SEARCHED).await;

        let report = timed(
            PipelineState::Writing,
            writer::write(self.invoker.as_ref(), &self.writer_role, query, &findings, recipient),
        )
        .await?;
        sender.status(PipelineState::Writing, STATUS_WRITTEN).await;

        let report = self.resolve_recipient(report, recipient);
        sender
            .status(
                PipelineState::Sending,
                format!("Sending email to {}...", report.recipient),
            )
            .await;

        timed(
            PipelineState::Sending,
            delivery::deliver(self.invoker.as_ref(), &self.email_role, &report),
        )
        .await?;
        sender.status(PipelineState::Sending, STATUS_SENT).await;

        Ok(report)
    }

    /// Pick the address Delivery uses
    ///
    /// By default the writer's echoed address is authoritative. With
    /// `RecipientSource::Caller` a new artifact carrying the caller's address
    /// is produced instead.
    fn resolve_recipient(&self, report: ReportArtifact, caller_recipient: &str) -> ReportArtifact {
        let matches = report.recipient.trim().eq_ignore_ascii_case(caller_recipient.trim());
        if matches {
            return report;
        }

        match self.settings.recipient_source {
            RecipientSource::Report => {
                warn!(
                    caller = %caller_recipient,
                    report = %report.recipient,
                    "Report recipient differs from the requested address; using the report's"
                );
                report
            }
            RecipientSource::Caller => {
                warn!(
                    caller = %caller_recipient,
                    report = %report.recipient,
                    "Report recipient differs from the requested address; using the caller's"
                );
                ReportArtifact {
                    recipient: caller_recipient.trim().to_string(),
                    ..report
                }
            }
        }
    }
}

/// Run one stage inside its span and record how long it took
async fn timed<T, F>(stage: PipelineState, stage_future: F) -> ResearchResult<T>
where
    F: Future<Output = ResearchResult<T>>,
{
    let start = Instant::now();
    let result = stage_future
        .instrument(crate::stage_span!(stage = %stage))
        .await;
    metrics().stage_completed(stage, start.elapsed());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressEvent;
    use crate::testing::mocks::MockAgentInvoker;

    fn manager(
        invoker: MockAgentInvoker,
        recipient_source: RecipientSource,
    ) -> (ResearchManager, Arc<MockAgentInvoker>) {
        let invoker = Arc::new(invoker);
        let manager = ResearchManager::new(
            invoker.clone(),
            ResearchRoles::new(3, "Banking Bytes", false),
            PipelineSettings {
                max_concurrent_searches: None,
                recipient_source,
            },
        );
        (manager, invoker)
    }

    fn texts(events: &[ProgressEvent]) -> Vec<&str> {
        events.iter().map(ProgressEvent::display_text).collect()
    }

    #[tokio::test]
    async fn test_happy_path_emits_six_events() {
        let (manager, _) = manager(MockAgentInvoker::new(), RecipientSource::Report);
        let events = manager.run("Deposits", "reader@example.com").collect_all().await;

        assert_eq!(events.len(), 6);
        let texts = texts(&events);
        assert_eq!(texts[0], STATUS_PLANNED);
        assert_eq!(texts[1], STATUS_SEARCHED);
        assert_eq!(texts[2], STATUS_WRITTEN);
        assert_eq!(texts[3], "Sending email to reader@example.com...");
        assert_eq!(texts[4], STATUS_SENT);
        assert!(matches!(events[5].payload, ProgressPayload::Report(_)));

        let stages: Vec<PipelineState> = events.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                PipelineState::Planning,
                PipelineState::Searching,
                PipelineState::Writing,
                PipelineState::Sending,
                PipelineState::Sending,
                PipelineState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_recipient_from_report_is_authoritative_by_default() {
        let invoker = MockAgentInvoker::new().with_report_recipient("model@example.com");
        let (manager, invoker) = manager(invoker, RecipientSource::Report);
        manager.run("Deposits", "reader@example.com").collect_all().await;

        let inputs = invoker.inputs_for(crate::agents::instructions::EMAIL_AGENT).await;
        assert!(inputs[0].ends_with("Recipient email id: model@example.com"));
    }

    #[tokio::test]
    async fn test_caller_recipient_overrides_report() {
        let invoker = MockAgentInvoker::new().with_report_recipient("model@example.com");
        let (manager, invoker) = manager(invoker, RecipientSource::Caller);
        manager.run("Deposits", "reader@example.com").collect_all().await;

        let inputs = invoker.inputs_for(crate::agents::instructions::EMAIL_AGENT).await;
        assert!(inputs[0].ends_with("Recipient email id: reader@example.com"));
    }

    #[tokio::test]
    async fn test_writer_failure_ends_with_single_failure_event() {
        let invoker = MockAgentInvoker::new().failing_role(crate::agents::instructions::WRITER_AGENT);
        let (manager, invoker) = manager(invoker, RecipientSource::Report);
        let events = manager.run("Deposits", "reader@example.com").collect_all().await;

        let last = events.last().unwrap();
        assert!(last.is_failure());
        assert_eq!(last.stage, PipelineState::Failed);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(invoker.calls_for(crate::agents::instructions::EMAIL_AGENT), 0);
    }
}
