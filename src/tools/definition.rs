//! Tool definitions and argument validation

use serde_json::{Map, Value, json};

use super::ToolError;
use crate::llm::{FINISH_TOOL, ToolCall, ToolDefinition};

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Tool {
    /// List a directory, defaulting to the cursor
    GetDirectory { path: Option<String> },
    /// Read a text file
    ReadFile { path: String },
    /// Create or overwrite a file with one commit
    UpdateFile {
        path: String,
        content: String,
        message: String,
    },
    /// Move the directory cursor
    ChangeDir { path: String },
    /// Report completion
    FinishTask { summary: String, success: bool },
}

impl Tool {
    /// Validate a model tool call into a `Tool`
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        let name = call.name.as_str();
        let args = call
            .input
            .as_object()
            .ok_or_else(|| ToolError::ArgumentsNotObject { tool: name.to_string() })?;

        match name {
            "get_directory" => Ok(Tool::GetDirectory {
                path: optional_str(name, args, "path")?,
            }),
            "read_file" => Ok(Tool::ReadFile {
                path: required_str(name, args, "path")?,
            }),
            "update_file" => Ok(Tool::UpdateFile {
                path: required_str(name, args, "path")?,
                content: required_str(name, args, "content")?,
                message: required_str(name, args, "message")?,
            }),
            "change_dir" => Ok(Tool::ChangeDir {
                path: required_str(name, args, "path")?,
            }),
            FINISH_TOOL => Ok(Tool::FinishTask {
                summary: required_str(name, args, "summary")?,
                success: required_bool(name, args, "success")?,
            }),
            other => Err(ToolError::UnknownTool { name: other.to_string() }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::GetDirectory { .. } => "get_directory",
            Tool::ReadFile { .. } => "read_file",
            Tool::UpdateFile { .. } => "update_file",
            Tool::ChangeDir { .. } => "change_dir",
            Tool::FinishTask { .. } => FINISH_TOOL,
        }
    }
}

fn required_str(tool: &str, args: &Map<String, Value>, arg: &str) -> Result<String, ToolError> {
    match args.get(arg) {
        None | Some(Value::Null) => Err(ToolError::MissingArgument {
            tool: tool.to_string(),
            arg: arg.to_string(),
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(invalid(tool, arg, "string")),
    }
}

fn optional_str(tool: &str, args: &Map<String, Value>, arg: &str) -> Result<Option<String>, ToolError> {
    match args.get(arg) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(tool, arg, "string")),
    }
}

fn required_bool(tool: &str, args: &Map<String, Value>, arg: &str) -> Result<bool, ToolError> {
    match args.get(arg) {
        None | Some(Value::Null) => Err(ToolError::MissingArgument {
            tool: tool.to_string(),
            arg: arg.to_string(),
        }),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(invalid(tool, arg, "boolean")),
    }
}

fn invalid(tool: &str, arg: &str, expected: &str) -> ToolError {
    ToolError::InvalidArgument {
        tool: tool.to_string(),
        arg: arg.to_string(),
        expected: expected.to_string(),
    }
}

/// Schemas sent to the model on every call
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "get_directory",
            "List the files and directories in the current directory, or in 'path' relative to it.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory to list, relative to the current directory. A leading '/' starts at the repository root."
                    }
                },
                "required": []
            }),
        ),
        ToolDefinition::new(
            "read_file",
            "Read the full text of a file in the repository.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File path relative to the current directory"
                    }
                },
                "required": ["path"]
            }),
        ),
        ToolDefinition::new(
            "update_file",
            "Create or overwrite a file on the working branch with one commit. Provide the complete new file content.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File path relative to the current directory"
                    },
                    "content": {
                        "type": "string",
                        "description": "Complete new content of the file"
                    },
                    "message": {
                        "type": "string",
                        "description": "Commit message describing the change"
                    }
                },
                "required": ["path", "content", "message"]
            }),
        ),
        ToolDefinition::new(
            "change_dir",
            "Change the current directory. Use '..' to go up and '/' for the repository root.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory to move to"
                    }
                },
                "required": ["path"]
            }),
        ),
        ToolDefinition::new(
            FINISH_TOOL,
            "Finish the task. Call this once all changes are committed, or when the task cannot be completed.",
            json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "What was changed and why"
                    },
                    "success": {
                        "type": "boolean",
                        "description": "Whether the objective was achieved"
                    }
                },
                "required": ["summary", "success"]
            }),
        ),
    ]
}
