//! Turning a completion into the next agent action
//!
//! Native tool calls are preferred. Models that ignore the tools array and
//! answer with `{"tool": ..., "parameters": ...}` in plain text are accepted
//! through a fallback scan of the content.

use log::{debug, warn};
use serde_json::Value;

use crate::llm::backend::{CompletionSignal, NextAction};
use crate::llm::client::LlmError;
use crate::llm::types::{CompletionResponse, ToolCall};

/// Name of the tool that ends a run
pub const FINISH_TOOL: &str = "finish_task";

/// Id prefix for tool calls recovered from text
const TEXT_CALL_PREFIX: &str = "call_from_text";

/// Decide the next action from a model response
///
/// Only the first tool call is honored. A response with no recoverable tool
/// call is an `InvalidResponse`. `turn` numbers the ids of calls recovered
/// from text so each stays unique within a transcript.
pub fn next_action(response: &CompletionResponse, turn: usize) -> Result<NextAction, LlmError> {
    let thought = Some(response.content.trim())
        .filter(|s| !s.is_empty())
        .map(String::from);

    let call = match response.tool_calls.first() {
        Some(call) => {
            if response.tool_calls.len() > 1 {
                warn!(
                    "Model returned {} tool calls, only '{}' will run",
                    response.tool_calls.len(),
                    call.name
                );
            }
            call.clone()
        }
        None => extract_text_call(&response.content, turn).ok_or_else(|| {
            LlmError::InvalidResponse("model replied without a tool call".to_string())
        })?,
    };

    if call.name == FINISH_TOOL {
        if let Some(signal) = completion_signal(&call.input) {
            return Ok(NextAction::Complete(signal));
        }
    }

    Ok(NextAction::ToolCall { thought, call })
}

/// Read `finish_task` arguments; `None` when they are malformed
fn completion_signal(input: &Value) -> Option<CompletionSignal> {
    let summary = input.get("summary")?.as_str()?.to_string();
    let success = input.get("success")?.as_bool()?;
    Some(CompletionSignal { summary, success })
}

/// Recover a `{"tool": name, "parameters": {...}}` object from free text
pub fn extract_text_call(content: &str, turn: usize) -> Option<ToolCall> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    let candidate: Value = serde_json::from_str(&content[start..=end]).ok()?;
    let name = candidate.get("tool")?.as_str()?;
    let input = candidate
        .get("parameters")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    debug!("Recovered '{}' tool call from response text", name);
    Some(ToolCall::new(format!("{}_{}", TEXT_CALL_PREFIX, turn), name, input))
}
