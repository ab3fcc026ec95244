//! Search fan-out stage
//!
//! One task per directive, joined by a barrier. A unit that fails for any
//! reason (model error, empty answer, panic) contributes no finding and never
//! affects its siblings.

use super::{FindingsSet, SearchDirective, SearchFinding, SearchPlan};
use crate::agents::{AgentInvoker, RoleConfig};
use crate::observability::metrics;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Run one search unit; `None` means the unit failed
async fn search_one(
    invoker: &dyn AgentInvoker,
    role: &RoleConfig,
    directive: &SearchDirective,
) -> Option<SearchFinding> {
    match invoker.invoke(role, &directive.to_search_input()).await {
        Ok(output) if output.text.trim().is_empty() => {
            warn!(query = %directive.query, "Search agent returned an empty summary");
            None
        }
        Ok(output) => Some(output.text),
        Err(e) => {
            warn!(query = %directive.query, error = %e, "Search unit failed");
            None
        }
    }
}

/// Execute every directive concurrently and collect the successful findings
///
/// Findings arrive in completion order. `max_concurrent` bounds the number of
/// units in flight; `None` launches all of them at once.
pub async fn search_all(
    invoker: Arc<dyn AgentInvoker>,
    role: Arc<RoleConfig>,
    plan: &SearchPlan,
    max_concurrent: Option<usize>,
) -> FindingsSet {
    let mut findings = FindingsSet::new();
    if plan.is_empty() {
        info!("Search plan is empty; nothing to search");
        return findings;
    }

    let limiter = max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1))));
    let total = plan.len();
    let mut set = JoinSet::new();

    for directive in plan.iter().cloned() {
        let invoker = Arc::clone(&invoker);
        let role = Arc::clone(&role);
        let limiter = limiter.clone();

        set.spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return None,
                },
                None => None,
            };
            search_one(invoker.as_ref(), &role, &directive).await
        });
    }

    let mut completed = 0;
    while let Some(joined) = set.join_next().await {
        completed += 1;
        let finding = match joined {
            Ok(finding) => finding,
            Err(e) => {
                warn!(error = %e, "Search unit aborted");
                None
            }
        };

        metrics().search_unit_finished(finding.is_some());
        if let Some(finding) = finding {
            findings.push(finding);
        }
        debug!("Searching... {completed}/{total} completed");
    }

    info!(
        planned = total,
        found = findings.len(),
        "Finished searching"
    );
    findings
}
