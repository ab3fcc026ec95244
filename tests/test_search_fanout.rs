//! Search fan-out properties
//!
//! Every planned directive is searched exactly once; failed units are
//! dropped from the findings without affecting the others.

use banking_bytes::agents::{AgentInvoker, ResearchRoles, RoleConfig};
use banking_bytes::research::{search_all, SearchDirective, SearchPlan};
use banking_bytes::testing::MockAgentInvoker;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn search_role() -> Arc<RoleConfig> {
    Arc::new(ResearchRoles::new(3, "Banking Bytes", false).search)
}

fn plan_of(size: usize) -> SearchPlan {
    SearchPlan::new(
        (0..size)
            .map(|i| SearchDirective::new(format!("reason {i}"), format!("query {i}")))
            .collect(),
    )
}

proptest! {
    #[test]
    fn findings_never_exceed_plan_size(size in 0usize..8, failing in proptest::collection::vec(any::<bool>(), 8)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();

        let mut invoker = MockAgentInvoker::new();
        let mut expected_failures = 0;
        for (i, fails) in failing.iter().take(size).enumerate() {
            if *fails {
                invoker = invoker.failing_search(&format!("query {i}"));
                expected_failures += 1;
            }
        }
        let invoker = Arc::new(invoker);

        let findings = runtime.block_on(search_all(
            invoker.clone() as Arc<dyn AgentInvoker>,
            search_role(),
            &plan_of(size),
            None,
        ));

        prop_assert!(findings.len() <= size);
        prop_assert_eq!(findings.len(), size - expected_failures);
        prop_assert_eq!(invoker.total_calls(), size);
        for (i, fails) in failing.iter().take(size).enumerate() {
            let summary = format!("Summary for query {i}");
            prop_assert_eq!(findings.contains(&summary), !*fails);
        }
    }
}

#[tokio::test]
async fn test_empty_plan_makes_no_calls() {
    let invoker = Arc::new(MockAgentInvoker::new());

    let findings = search_all(invoker.clone(), search_role(), &plan_of(0), None).await;

    assert!(findings.is_empty());
    assert_eq!(invoker.total_calls(), 0);
}

#[tokio::test]
async fn test_searches_run_concurrently_when_unbounded() {
    let invoker = Arc::new(MockAgentInvoker::new().with_search_delay(Duration::from_millis(50)));

    let findings = search_all(invoker.clone(), search_role(), &plan_of(5), None).await;

    assert_eq!(findings.len(), 5);
    assert_eq!(invoker.max_concurrent_searches(), 5);
}

#[tokio::test]
async fn test_concurrency_cap_is_respected() {
    let invoker = Arc::new(MockAgentInvoker::new().with_search_delay(Duration::from_millis(20)));

    let findings = search_all(invoker.clone(), search_role(), &plan_of(6), Some(2)).await;

    assert_eq!(findings.len(), 6);
    assert!(invoker.max_concurrent_searches() <= 2);
    assert_eq!(invoker.total_calls(), 6);
}

#[tokio::test]
async fn test_blank_summaries_are_dropped() {
    let invoker = Arc::new(MockAgentInvoker::new().with_response("Search agent", "   "));

    let findings = search_all(invoker.clone(), search_role(), &plan_of(3), None).await;

    assert!(findings.is_empty());
    assert_eq!(invoker.total_calls(), 3);
}
