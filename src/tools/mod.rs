//! Tool system - the closed set of actions the model can take
//!
//! `Tool` parses and validates a model `ToolCall`; `ToolDispatcher` executes
//! it against the repository for one run and turns the outcome into a
//! `ToolResult` observation.

mod definition;
mod dispatcher;
mod path;
mod result;

pub use definition::{Tool, tool_definitions};
pub use dispatcher::ToolDispatcher;
pub use path::{display_path, resolve_file_path, resolve_path};
pub use result::ToolResult;

use crate::repo::RepositoryError;

/// Errors raised while validating or executing a tool call
///
/// Everything except a transport-level `Repository` error becomes a failed
/// observation the model can react to.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("{tool}: arguments must be a JSON object")]
    ArgumentsNotObject { tool: String },

    #[error("{tool}: missing required argument '{arg}'")]
    MissingArgument { tool: String, arg: String },

    #[error("{tool}: argument '{arg}' must be a {expected}")]
    InvalidArgument {
        tool: String,
        arg: String,
        expected: String,
    },

    #[error("Path '{path}' escapes the repository root")]
    PathEscapesRoot { path: String },

    #[error("Path '{path}' does not name a file")]
    NotAFile { path: String },

    #[error("finish_task is handled by the agent loop")]
    FinishNotDispatchable,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
