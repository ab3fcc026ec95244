//! Testing utilities and mock implementations
//!
//! Lets the pipeline run without a model backend, a search API or a mail
//! provider.

pub mod mocks;

pub use mocks::*;
