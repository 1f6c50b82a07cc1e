//! LLM layer - chat-completions client, response parsing, and the model backend
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - OpenAiClient implementation (OpenAI and Azure OpenAI)
//! - Tool call extraction from responses
//! - ModelBackend, the seam the agent loop talks to

pub mod backend;
pub mod client;
pub mod openai;
pub mod tool_parser;
pub mod types;

pub use backend::{ChatModelBackend, CompletionSignal, MockModelBackend, ModelBackend, NextAction};
pub use client::{LlmClient, LlmError, MockLlmClient};
pub use openai::{Endpoint, OpenAiClient, OpenAiConfig};
pub use tool_parser::{FINISH_TOOL, next_action};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, ToolDefinition, Usage};
