//! The four research roles
//!
//! Built once from configuration and shared read-only for the whole process.

use super::{OutputShape, RoleConfig, ToolPolicy};
use crate::config::ResearchConfig;
use crate::research::{ReportArtifact, SearchPlan};
use crate::tools::builtin::send_email::SEND_EMAIL_TOOL;
use crate::tools::builtin::web_search::WEB_SEARCH_TOOL;

pub const PLANNER_AGENT: &str = "PlannerAgent";
pub const SEARCH_AGENT: &str = "Search agent";
pub const WRITER_AGENT: &str = "WriterAgent";
pub const EMAIL_AGENT: &str = "Email agent";

const SEARCH_INSTRUCTIONS: &str = "You are a research assistant. Given a search term, you search the web for that term and \
produce a concise summary of the results. The summary must be 2-3 paragraphs and less than 300 \
words. Capture the main points. Write succinctly, no need to have complete sentences or good \
grammar. This will be consumed by someone synthesizing a report, so it is vital you capture the \
essence and ignore any fluff. Do not include any additional commentary other than the summary itself.";

const WRITER_INSTRUCTIONS: &str = "You are a senior researcher tasked with writing a cohesive report for a research query. \
You will be provided with the original query, and some initial research done by a research assistant.\n\
You should first come up with an outline for the report that describes the structure and \
flow of the report. Then, generate the report and return that as your final output.\n\
The final output should be in markdown format, it should be in an attractive format so use tables if needed, \
and it should be lengthy and detailed. Aim for at least 300 words. \
Put the receiver's email id in the recipient field exactly as given.";

fn planner_instructions(no_of_searches: usize) -> String {
    format!(
        "You are a helpful research assistant. Given a query, come up with a set of web searches \
         to perform to best answer the query. Output {no_of_searches} terms to query for."
    )
}

fn email_instructions(heading: &str) -> String {
    format!(
        "You are able to send a nicely formatted HTML email based on a detailed report. The email \
         should be attractive and can include tables. You will be provided with a detailed report \
         and the recipient email id.\n\
         You should use your tool to send one email, providing the report converted into clean, \
         well presented HTML with an appropriate subject line.\n\
         Always give the heading as {heading}."
    )
}

/// Role configurations for every stage
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchRoles {
    pub planner: RoleConfig,
    pub search: RoleConfig,
    pub writer: RoleConfig,
    pub email: RoleConfig,
}

impl ResearchRoles {
    /// Build the roles; the search role only gets the web search tool (and is
    /// only forced to use it) when the tool is actually available
    pub fn new(no_of_searches: usize, heading: &str, web_search_available: bool) -> Self {
        let planner = RoleConfig::new(PLANNER_AGENT, planner_instructions(no_of_searches))
            .with_output(OutputShape::structured::<SearchPlan>("SearchPlan"));

        let mut search = RoleConfig::new(SEARCH_AGENT, SEARCH_INSTRUCTIONS);
        if web_search_available {
            search = search
                .with_tool(WEB_SEARCH_TOOL)
                .with_tool_policy(ToolPolicy::RequiredToolUse);
        }

        let writer = RoleConfig::new(WRITER_AGENT, WRITER_INSTRUCTIONS)
            .with_output(OutputShape::structured::<ReportArtifact>("ReportArtifact"));

        let email = RoleConfig::new(EMAIL_AGENT, email_instructions(heading))
            .with_tool(SEND_EMAIL_TOOL)
            .with_tool_policy(ToolPolicy::RequiredToolUse);

        Self {
            planner,
            search,
            writer,
            email,
        }
    }

    pub fn from_config(config: &ResearchConfig, web_search_available: bool) -> Self {
        Self::new(
            config.research.no_of_searches,
            &config.email.heading,
            web_search_available,
        )
    }
}
