//! Synthesis stage: query and findings in, structured report out

use super::{FindingsSet, PipelineState, ReportArtifact};
use crate::agents::{invoke_structured, AgentInvoker, RoleConfig};
use crate::error::{ResearchError, ResearchResult};
use tracing::{info, warn};

fn writer_input(query: &str, findings: &FindingsSet, recipient: &str) -> ResearchResult<String> {
    let findings_list = serde_json::to_string(findings)
        .map_err(|e| ResearchError::internal_error(format!("cannot serialize findings: {e}")))?;

    Ok(format!(
        "Original query: {query}\nSummarized search results: {findings_list}\nReceiver email id: {recipient}"
    ))
}

/// Ask the writer for the report
///
/// An empty findings set is passed through as an empty list; the writer is
/// expected to say the research was inconclusive rather than fail.
pub async fn write(
    invoker: &dyn AgentInvoker,
    role: &RoleConfig,
    query: &str,
    findings: &FindingsSet,
    recipient: &str,
) -> ResearchResult<ReportArtifact> {
    if findings.is_empty() {
        warn!("Writing report without any search findings");
    }
    info!(findings = findings.len(), "Thinking about report");

    let input = writer_input(query, findings, recipient)?;
    let report: ReportArtifact = invoke_structured(invoker, role, &input)
        .await
        .map_err(|e| ResearchError::from_invocation(PipelineState::Writing, e))?;

    info!(
        words = report.markdown_body.split_whitespace().count(),
        follow_ups = report.follow_ups.len(),
        "Finished writing report"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ResearchRoles;
    use crate::testing::mocks::MockAgentInvoker;

    #[test]
    fn test_writer_input_lists_findings() {
        let findings = FindingsSet::from(vec!["first".to_string(), "second".to_string()]);
        let input = writer_input("Deposits", &findings, "reader@example.com").unwrap();

        assert!(input.starts_with("Original query: Deposits\n"));
        assert!(input.contains(r#"Summarized search results: ["first","second"]"#));
        assert!(input.ends_with("Receiver email id: reader@example.com"));
    }

    #[tokio::test]
    async fn test_write_with_empty_findings() {
        let roles = ResearchRoles::new(4, "Banking Bytes", false);
        let invoker = MockAgentInvoker::new();

        let report = write(&invoker, &roles.writer, "Deposits", &FindingsSet::new(), "reader@example.com")
            .await
            .unwrap();

        assert_eq!(report.recipient, "reader@example.com");
        let inputs = invoker.inputs_for(&roles.writer.name).await;
        assert!(inputs[0].contains("Summarized search results: []"));
    }

    #[tokio::test]
    async fn test_missing_report_field_fails_writing() {
        let roles = ResearchRoles::new(4, "Banking Bytes", false);
        let invoker = MockAgentInvoker::new().with_response(
            &roles.writer.name,
            r#"{"short_summary": "s", "markdown_body": "b", "follow_ups": []}"#,
        );

        let result = write(&invoker, &roles.writer, "q", &FindingsSet::new(), "reader@example.com").await;
        assert!(matches!(
            result,
            Err(ResearchError::ValidationError { stage: PipelineState::Writing, .. })
        ));
    }
}
