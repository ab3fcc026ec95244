//! Builtin tools: web search for the search agent, email for the delivery agent

pub mod send_email;
pub mod web_search;

pub use send_email::SendEmailTool;
pub use web_search::WebSearchTool;
