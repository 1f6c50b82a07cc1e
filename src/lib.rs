//! aidev - an agentic engine that turns an objective or a Jira ticket into a
//! GitHub pull request.
//!
//! A model drives a closed set of repository tools one call at a time until it
//! signals completion; intake decides which tickets may start such a run and
//! keeps two runs from working the same ticket at once.

pub mod config;
pub mod domain;
pub mod error;
pub mod intake;
pub mod jira;
pub mod llm;
pub mod repo;
pub mod resolver;
pub mod runner;
pub mod tools;

pub use error::{AidevError, Result};
