//! LLM provider abstraction layer
//!
//! A provider-agnostic completion interface plus the chat-completions
//! implementation used for both OpenAI and Gemini.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
