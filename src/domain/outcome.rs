//! Run states and the terminal run record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// State of an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Constructed, working branch not yet created
    Created,
    /// Waiting on the model backend
    AwaitingModel,
    /// Executing a tool call against the repository
    DispatchingTool,
    /// Model signalled completion
    Finished,
    /// Model or repository transport failure
    Failed,
    /// Iteration cap reached without completion
    IterationLimitExceeded,
}

impl RunState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Finished | RunState::Failed | RunState::IterationLimitExceeded
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Created => "created",
            RunState::AwaitingModel => "awaiting_model",
            RunState::DispatchingTool => "dispatching_tool",
            RunState::Finished => "finished",
            RunState::Failed => "failed",
            RunState::IterationLimitExceeded => "iteration_limit_exceeded",
        };
        write!(f, "{}", s)
    }
}

/// Which terminal state a run ended in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Finished,
    Failed,
    IterationLimitExceeded,
}

impl From<RunOutcome> for RunState {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Finished => RunState::Finished,
            RunOutcome::Failed => RunState::Failed,
            RunOutcome::IterationLimitExceeded => RunState::IterationLimitExceeded,
        }
    }
}

/// Terminal record of one run. Produced exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub summary: String,
    pub files_modified: BTreeSet<String>,
    pub iterations: u32,
    pub pull_request_url: Option<String>,
    pub outcome: RunOutcome,
    pub branch: String,
}

impl RunResult {
    /// Files in sorted order, for comments and PR bodies
    pub fn files_list(&self) -> Vec<&str> {
        self.files_modified.iter().map(String::as_str).collect()
    }
}
