//! Runner module - the agentic iteration engine.
//!
//! This module provides the core run execution logic, including:
//! - AgentLoop for driving one objective to a RunResult
//! - The system prompt handed to the model
//! - Pull request title and description for finished runs

mod agent_loop;
mod prompt;
mod pull_request;

pub use agent_loop::{AgentLoop, AgentLoopConfig, DEFAULT_MAX_ITERATIONS};
pub use prompt::system_prompt;
pub use pull_request::{pull_request_description, pull_request_title};
