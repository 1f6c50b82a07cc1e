//! Conversation state for one agent run.
//!
//! The conversation is the model's only memory of prior actions, so it is an
//! append-only log: turns are added in completion order and never removed,
//! edited, or reordered.

use serde::{Deserialize, Serialize};

use crate::llm::ToolCall;
use crate::tools::ToolResult;

/// One entry in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// Framing instructions for the model
    System { content: String },

    /// The task as stated to the model
    Objective { content: String },

    /// A tool call the model chose, with any accompanying text
    Action {
        #[serde(skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
        call: ToolCall,
    },

    /// The dispatcher's answer to the preceding action
    Observation { call_id: String, result: ToolResult },
}

/// Ordered, append-only sequence of turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation with the system framing and the objective
    pub fn new(system: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            turns: vec![
                Turn::System {
                    content: system.into(),
                },
                Turn::Objective {
                    content: objective.into(),
                },
            ],
        }
    }

    /// Append a turn at the end of the log
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Record a model action followed by its observation
    pub fn append_exchange(&mut self, thought: Option<String>, call: ToolCall, result: ToolResult) {
        let call_id = call.id.clone();
        self.append(Turn::Action { thought, call });
        self.append(Turn::Observation { call_id, result });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of actions the model has taken so far
    pub fn action_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| matches!(t, Turn::Action { .. }))
            .count()
    }
}
