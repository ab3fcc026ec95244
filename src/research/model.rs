//! Data contracts passed between pipeline stages
//!
//! Every value here is created by exactly one stage and never mutated
//! afterwards. The doc comments on schema-bearing fields are sent to the
//! model as field descriptions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One unit of fan-out work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchDirective {
    /// Your reasoning for why this search is important to the query.
    #[schemars(length(min = 1))]
    pub reason: String,
    /// The search term to use for the web search.
    #[schemars(length(min = 1))]
    pub query: String,
}

impl SearchDirective {
    pub fn new(reason: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            query: query.into(),
        }
    }

    /// Input handed to the search agent
    pub fn to_search_input(&self) -> String {
        format!(
            "Search term: {}\nReason for searching: {}",
            self.query, self.reason
        )
    }
}

/// Ordered directives produced by planning
///
/// The requested length is a hint to the model, so any length is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchPlan {
    /// A list of web searches to perform to best answer the query.
    pub searches: Vec<SearchDirective>,
}

impl SearchPlan {
    pub fn new(searches: Vec<SearchDirective>) -> Self {
        Self { searches }
    }

    pub fn len(&self) -> usize {
        self.searches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchDirective> {
        self.searches.iter()
    }
}

/// Summary produced by one successful search unit
pub type SearchFinding = String;

/// Findings that survived the fan-out, in completion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingsSet(Vec<SearchFinding>);

impl FindingsSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, finding: SearchFinding) {
        self.0.push(finding);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchFinding> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[SearchFinding] {
        &self.0
    }

    pub fn contains(&self, finding: &str) -> bool {
        self.0.iter().any(|f| f == finding)
    }
}

impl From<Vec<SearchFinding>> for FindingsSet {
    fn from(findings: Vec<SearchFinding>) -> Self {
        Self(findings)
    }
}

impl IntoIterator for FindingsSet {
    type Item = SearchFinding;
    type IntoIter = std::vec::IntoIter<SearchFinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Structured report produced by synthesis and consumed by delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportArtifact {
    /// A short 2-3 sentence summary of the findings.
    #[schemars(length(min = 1))]
    pub short_summary: String,
    /// The final report in markdown.
    #[schemars(length(min = 1))]
    pub markdown_body: String,
    /// The email id of the receiver.
    #[schemars(length(min = 1))]
    pub recipient: String,
    /// Suggested topics to research further.
    pub follow_ups: Vec<String>,
}

/// Outcome of a successful delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub recipient: String,
    pub subject: String,
    pub status_code: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::OutputShape;
    use serde_json::json;

    #[test]
    fn test_search_input_format() {
        let directive = SearchDirective::new("Rates drive margins", "net interest margin 2025");
        assert_eq!(
            directive.to_search_input(),
            "Search term: net interest margin 2025\nReason for searching: Rates drive margins"
        );
    }

    #[test]
    fn test_plan_schema_requires_fields() {
        let shape = OutputShape::structured::<SearchPlan>("SearchPlan");
        let schema = shape.schema().unwrap();
        let item = &schema["properties"]["searches"]["items"];

        let required: Vec<&str> = item["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"reason"));
        assert!(required.contains(&"query"));
        assert_eq!(item["properties"]["query"]["minLength"], 1);
    }

    #[test]
    fn test_report_follow_ups_may_be_empty() {
        let report: ReportArtifact = serde_json::from_value(json!({
            "short_summary": "Deposits grew.",
            "markdown_body": "# Deposits",
            "recipient": "reader@example.com",
            "follow_ups": []
        }))
        .unwrap();
        assert!(report.follow_ups.is_empty());
    }

    #[test]
    fn test_findings_set_serializes_as_list() {
        let findings = FindingsSet::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(serde_json::to_value(&findings).unwrap(), json!(["a", "b"]));
        assert!(findings.contains("b"));
        assert_eq!(findings.len(), 2);
    }
}
