//! Planning stage: query in, search plan out

use super::{PipelineState, SearchPlan};
use crate::agents::{invoke_structured, AgentInvoker, RoleConfig};
use crate::error::{ResearchError, ResearchResult};
use tracing::info;

/// Ask the planner for a search plan
///
/// The requested number of searches is only a hint; a plan of any length,
/// including zero, is accepted.
pub async fn plan(invoker: &dyn AgentInvoker, role: &RoleConfig, query: &str) -> ResearchResult<SearchPlan> {
    info!("Planning searches");
    let search_plan: SearchPlan = invoke_structured(invoker, role, &format!("Query: {query}"))
        .await
        .map_err(|e| ResearchError::from_invocation(PipelineState::Planning, e))?;

    info!(searches = search_plan.len(), "Will perform {} searches", search_plan.len());
    Ok(search_plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ResearchRoles;
    use crate::testing::mocks::MockAgentInvoker;

    #[tokio::test]
    async fn test_plan_accepts_any_length() {
        let roles = ResearchRoles::new(4, "Banking Bytes", false);
        let invoker = MockAgentInvoker::new().with_plan(&[("why", "bank deposits 2025")]);

        let search_plan = plan(&invoker, &roles.planner, "Deposits").await.unwrap();
        assert_eq!(search_plan.len(), 1);
        assert_eq!(invoker.inputs_for(&roles.planner.name).await, vec!["Query: Deposits".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_plan_is_validation_error() {
        let roles = ResearchRoles::new(4, "Banking Bytes", false);
        let invoker = MockAgentInvoker::new().with_response(&roles.planner.name, r#"{"searches": [{"query": "x"}]}"#);

        let result = plan(&invoker, &roles.planner, "Deposits").await;
        assert!(matches!(
            result,
            Err(ResearchError::ValidationError { stage: PipelineState::Planning, .. })
        ));
    }

    #[tokio::test]
    async fn test_model_failure_is_model_error() {
        let roles = ResearchRoles::new(4, "Banking Bytes", false);
        let invoker = MockAgentInvoker::new().failing_role(&roles.planner.name);

        let result = plan(&invoker, &roles.planner, "Deposits").await;
        assert!(matches!(result, Err(ResearchError::ModelError { .. })));
    }
}
