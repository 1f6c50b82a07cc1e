//! Tool dispatcher - executes validated tool calls for one run

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde_json::{Value, json};

use super::path::{display_path, resolve_file_path, resolve_path};
use super::{Tool, ToolError, ToolResult};
use crate::llm::ToolCall;
use crate::repo::{RepositoryError, RepositoryProxy, with_timeout};

/// Per-run tool executor holding the directory cursor and modified files
pub struct ToolDispatcher<R: RepositoryProxy + ?Sized> {
    repo: Arc<R>,
    branch: String,
    cursor: String,
    files_modified: BTreeSet<String>,
    call_timeout: Option<Duration>,
}

impl<R: RepositoryProxy + ?Sized> ToolDispatcher<R> {
    /// Dispatcher working on `branch`, cursor at the repository root
    pub fn new(repo: Arc<R>, branch: impl Into<String>) -> Self {
        Self {
            repo,
            branch: branch.into(),
            cursor: String::new(),
            files_modified: BTreeSet::new(),
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Current directory, root-absolute
    pub fn cursor(&self) -> String {
        display_path(&self.cursor)
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn files_modified(&self) -> &BTreeSet<String> {
        &self.files_modified
    }

    pub fn into_files_modified(self) -> BTreeSet<String> {
        self.files_modified
    }

    /// Execute one tool call
    ///
    /// Argument and tool-level failures come back as `ToolResult::Failed`.
    /// Only transport-level repository errors are returned as `Err`.
    pub async fn dispatch(&mut self, call: &ToolCall) -> Result<ToolResult, RepositoryError> {
        debug!("Dispatching {} ({}) at {}", call.name, call.id, self.cursor());

        let outcome = match Tool::parse(call) {
            Ok(tool) => self.execute(tool).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(payload) => Ok(ToolResult::ok(payload)),
            Err(ToolError::Repository(e)) if !e.is_tool_level() => Err(e),
            Err(e) => {
                warn!("Tool call {} failed: {}", call.name, e);
                Ok(ToolResult::failed(e.to_string()))
            }
        }
    }

    async fn execute(&mut self, tool: Tool) -> Result<Value, ToolError> {
        match tool {
            Tool::GetDirectory { path } => {
                let target = resolve_path(&self.cursor, path.as_deref().unwrap_or(""))?;
                let entries = with_timeout(self.call_timeout, self.repo.get_directory(&self.branch, &target)).await?;
                Ok(json!({
                    "path": display_path(&target),
                    "entries": entries
                }))
            }
            Tool::ReadFile { path } => {
                let target = resolve_file_path(&self.cursor, &path)?;
                let content = with_timeout(self.call_timeout, self.repo.read_file(&self.branch, &target)).await?;
                Ok(json!({
                    "path": display_path(&target),
                    "content": content
                }))
            }
            Tool::UpdateFile {
                path,
                content,
                message,
            } => {
                let target = resolve_file_path(&self.cursor, &path)?;
                let sha = with_timeout(
                    self.call_timeout,
                    self.repo.update_file(&self.branch, &target, &content, &message),
                )
                .await?;
                self.files_modified.insert(target.clone());
                Ok(json!({
                    "path": display_path(&target),
                    "commit": sha
                }))
            }
            Tool::ChangeDir { path } => {
                let target = resolve_path(&self.cursor, &path)?;
                with_timeout(self.call_timeout, self.repo.get_directory(&self.branch, &target)).await?;
                self.cursor = target;
                Ok(json!({ "cwd": self.cursor() }))
            }
            Tool::FinishTask { .. } => Err(ToolError::FinishNotDispatchable),
        }
    }
}
