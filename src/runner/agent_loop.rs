//! Agent loop - drives one objective to a terminal RunResult
//!
//! Each iteration sends the whole conversation to the model backend and
//! either dispatches the returned tool call or stops on a completion signal.
//! The conversation only grows; observations of failed tool calls stay in it
//! so the model can correct itself.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::prompt::system_prompt;
use super::pull_request::{pull_request_description, pull_request_title};
use crate::domain::{Conversation, Objective, RunOutcome, RunResult, RunState};
use crate::llm::{CompletionSignal, LlmError, ModelBackend, NextAction, ToolDefinition};
use crate::repo::{RepositoryProxy, with_timeout};
use crate::tools::{ToolDispatcher, tool_definitions};

/// Default iteration cap for a run
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// Configuration for the AgentLoop.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Bound on every model and repository call
    pub call_timeout: Option<Duration>,
    /// Open a pull request when a run finishes with changes
    pub create_pr: bool,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            call_timeout: None,
            create_pr: true,
        }
    }
}

/// Runs objectives against one repository
pub struct AgentLoop<M, R>
where
    M: ModelBackend + ?Sized,
    R: RepositoryProxy + ?Sized,
{
    /// Model backend deciding each action
    model: Arc<M>,
    /// Repository all tools act on
    repo: Arc<R>,
    config: AgentLoopConfig,
    state: RunState,
}

impl<M, R> AgentLoop<M, R>
where
    M: ModelBackend + ?Sized,
    R: RepositoryProxy + ?Sized,
{
    /// Create a new AgentLoop with default configuration.
    pub fn new(model: Arc<M>, repo: Arc<R>) -> Self {
        Self::with_config(model, repo, AgentLoopConfig::default())
    }

    /// Create a new AgentLoop with custom configuration.
    pub fn with_config(model: Arc<M>, repo: Arc<R>, config: AgentLoopConfig) -> Self {
        Self {
            model,
            repo,
            config,
            state: RunState::Created,
        }
    }

    /// State of the current or most recent run
    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!("Run state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Drive `objective` until completion, failure, or `max_iterations` model calls
    pub async fn run(&mut self, objective: &Objective, max_iterations: u32) -> RunResult {
        self.state = RunState::Created;
        info!(
            "Starting run on {} (branch {} from {}, max {} iterations)",
            objective.repo(),
            objective.branch(),
            objective.base_branch(),
            max_iterations
        );

        let branch = with_timeout(
            self.config.call_timeout,
            self.repo.create_branch(objective.base_branch(), objective.branch()),
        )
        .await;
        if let Err(e) = branch {
            return self.terminate(
                objective,
                RunOutcome::Failed,
                false,
                format!("Could not create branch {}: {}", objective.branch(), e),
                BTreeSet::new(),
                0,
            );
        }

        let mut conversation = Conversation::new(system_prompt(objective), objective.text());
        let tools = tool_definitions();
        let mut dispatcher =
            ToolDispatcher::new(self.repo.clone(), objective.branch()).with_call_timeout(self.config.call_timeout);
        let mut iterations: u32 = 0;

        loop {
            if iterations >= max_iterations {
                let files = dispatcher.into_files_modified();
                let summary = format!(
                    "Iteration limit of {} reached without completion; {} file(s) modified",
                    max_iterations,
                    files.len()
                );
                return self.terminate(
                    objective,
                    RunOutcome::IterationLimitExceeded,
                    false,
                    summary,
                    files,
                    iterations,
                );
            }
            iterations += 1;

            self.transition(RunState::AwaitingModel);
            let action = match self.ask_model(&conversation, &tools).await {
                Ok(action) => action,
                Err(e) => {
                    return self.terminate(
                        objective,
                        RunOutcome::Failed,
                        false,
                        format!("Model backend error: {}", e),
                        dispatcher.into_files_modified(),
                        iterations,
                    );
                }
            };

            match action {
                NextAction::Complete(signal) => {
                    return self
                        .finish(objective, signal, dispatcher.into_files_modified(), iterations)
                        .await;
                }
                NextAction::ToolCall { thought, call } => {
                    self.transition(RunState::DispatchingTool);
                    match dispatcher.dispatch(&call).await {
                        Ok(result) => {
                            debug!(
                                "Iteration {}: {} -> {}",
                                iterations,
                                call.name,
                                if result.is_failed() { "failed" } else { "ok" }
                            );
                            conversation.append_exchange(thought, call, result);
                        }
                        Err(e) => {
                            return self.terminate(
                                objective,
                                RunOutcome::Failed,
                                false,
                                format!("Repository error during {}: {}", call.name, e),
                                dispatcher.into_files_modified(),
                                iterations,
                            );
                        }
                    }
                }
            }
        }
    }

    async fn ask_model(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<NextAction, LlmError> {
        let call = self.model.next_action(conversation, tools);
        match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| LlmError::Timeout {
                    after_ms: limit.as_millis() as u64,
                })?,
            None => call.await,
        }
    }

    /// Handle a completion signal, opening a pull request when there are changes
    async fn finish(
        &mut self,
        objective: &Objective,
        signal: CompletionSignal,
        files: BTreeSet<String>,
        iterations: u32,
    ) -> RunResult {
        if !self.config.create_pr || files.is_empty() {
            return self.terminate(objective, RunOutcome::Finished, signal.success, signal.summary, files, iterations);
        }

        let title = pull_request_title(objective);
        let body = pull_request_description(objective, iterations, &signal.summary, &files);
        let created = with_timeout(
            self.config.call_timeout,
            self.repo
                .create_pull_request(objective.branch(), objective.base_branch(), &title, &body),
        )
        .await;

        match created {
            Ok(url) => {
                info!("Opened pull request {}", url);
                let mut result =
                    self.terminate(objective, RunOutcome::Finished, signal.success, signal.summary, files, iterations);
                result.pull_request_url = Some(url);
                result
            }
            Err(e) => self.terminate(
                objective,
                RunOutcome::Failed,
                false,
                format!("Pull request creation failed: {}. Model summary: {}", e, signal.summary),
                files,
                iterations,
            ),
        }
    }

    fn terminate(
        &mut self,
        objective: &Objective,
        outcome: RunOutcome,
        success: bool,
        summary: String,
        files_modified: BTreeSet<String>,
        iterations: u32,
    ) -> RunResult {
        self.transition(outcome.into());
        match outcome {
            RunOutcome::Finished => info!("Run finished after {} iteration(s): {}", iterations, summary),
            _ => warn!("Run ended {} after {} iteration(s): {}", self.state, iterations, summary),
        }

        RunResult {
            success,
            summary,
            files_modified,
            iterations,
            pull_request_url: None,
            outcome,
            branch: objective.branch().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepoRef;
    use crate::llm::{MockModelBackend, ToolCall};
    use crate::repo::{FailPoint, MemoryRepository};
    use serde_json::json;

    fn objective() -> Objective {
        Objective::new("Add a line to the README", RepoRef::new("acme", "widgets"), "ai-work", "main")
    }

    fn repo() -> Arc<MemoryRepository> {
        Arc::new(MemoryRepository::new("acme/widgets").with_file("README.md", "# Widgets\n"))
    }

    fn tool(name: &str, input: serde_json::Value) -> NextAction {
        NextAction::ToolCall {
            thought: None,
            call: ToolCall::new(format!("call_{}", name), name, input),
        }
    }

    fn finish(summary: &str, success: bool) -> NextAction {
        NextAction::Complete(CompletionSignal {
            summary: summary.to_string(),
            success,
        })
    }

    #[tokio::test]
    async fn test_finished_run_opens_pull_request() {
        let repo = repo();
        let model = Arc::new(MockModelBackend::with_actions(vec![
            tool("read_file", json!({"path": "README.md"})),
            tool(
                "update_file",
                json!({"path": "README.md", "content": "# Widgets\nMore\n", "message": "Extend README"}),
            ),
            finish("Extended the README", true),
        ]));

        let mut agent = AgentLoop::new(model.clone(), repo.clone());
        let result = agent.run(&objective(), 10).await;

        assert!(result.success);
        assert_eq!(result.outcome, RunOutcome::Finished);
        assert_eq!(result.iterations, 3);
        assert_eq!(result.files_list(), vec!["README.md"]);
        assert_eq!(agent.state(), RunState::Finished);

        let pulls = repo.pull_requests();
        assert_eq!(pulls.len(), 1);
        assert_eq!(pulls[0].head, "ai-work");
        assert_eq!(pulls[0].base, "main");
        assert_eq!(result.pull_request_url.as_deref(), Some(pulls[0].url.as_str()));
        assert_eq!(repo.file("main", "README.md").as_deref(), Some("# Widgets\n"));
    }

    #[tokio::test]
    async fn test_no_pull_request_without_changes() {
        let repo = repo();
        let model = Arc::new(MockModelBackend::with_actions(vec![finish("Nothing to do", true)]));

        let result = AgentLoop::new(model, repo.clone()).run(&objective(), 5).await;

        assert_eq!(result.outcome, RunOutcome::Finished);
        assert!(result.pull_request_url.is_none());
        assert!(repo.pull_requests().is_empty());
    }

    #[tokio::test]
    async fn test_pull_request_disabled() {
        let repo = repo();
        let model = Arc::new(MockModelBackend::with_actions(vec![
            tool("update_file", json!({"path": "a.txt", "content": "a", "message": "m"})),
            finish("done", true),
        ]));
        let config = AgentLoopConfig {
            create_pr: false,
            ..Default::default()
        };

        let result = AgentLoop::with_config(model, repo.clone(), config).run(&objective(), 5).await;

        assert!(result.success);
        assert!(repo.pull_requests().is_empty());
    }

    #[tokio::test]
    async fn test_tool_failures_do_not_end_run() {
        let repo = repo();
        let model = Arc::new(MockModelBackend::with_actions(vec![
            tool("read_file", json!({"path": "missing.txt"})),
            tool("update_file", json!({"path": "x"})),
            tool("change_dir", json!({"path": "../../etc"})),
            finish("gave up", false),
        ]));

        let result = AgentLoop::new(model, repo).run(&objective(), 10).await;

        assert_eq!(result.outcome, RunOutcome::Finished);
        assert!(!result.success);
        assert_eq!(result.iterations, 4);
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let actions = (0..10).map(|_| tool("get_directory", json!({}))).collect();
        let model = Arc::new(MockModelBackend::with_actions(actions));

        let mut agent = AgentLoop::new(model.clone(), repo());
        let result = agent.run(&objective(), 3).await;

        assert_eq!(result.outcome, RunOutcome::IterationLimitExceeded);
        assert!(!result.success);
        assert_eq!(result.iterations, 3);
        assert_eq!(model.calls(), 3);
        assert_eq!(agent.state(), RunState::IterationLimitExceeded);
    }

    #[tokio::test]
    async fn test_model_error_fails_run() {
        let model = Arc::new(MockModelBackend::new(vec![
            Ok(tool("get_directory", json!({}))),
            Err(LlmError::InvalidResponse("model replied without a tool call".to_string())),
        ]));

        let result = AgentLoop::new(model.clone(), repo()).run(&objective(), 10).await;

        assert_eq!(result.outcome, RunOutcome::Failed);
        assert_eq!(result.iterations, 2);
        assert!(result.summary.contains("without a tool call"));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_branch_creation_failure() {
        let repo = Arc::new(MemoryRepository::new("acme/widgets").fail_on(FailPoint::CreateBranch));
        let model = Arc::new(MockModelBackend::with_actions(vec![finish("x", true)]));

        let result = AgentLoop::new(model.clone(), repo).run(&objective(), 10).await;

        assert_eq!(result.outcome, RunOutcome::Failed);
        assert_eq!(result.iterations, 0);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_repository_transport_error_fails_run() {
        let repo = Arc::new(
            MemoryRepository::new("acme/widgets")
                .with_file("README.md", "x")
                .fail_on(FailPoint::UpdateFile),
        );
        let model = Arc::new(MockModelBackend::with_actions(vec![
            tool("update_file", json!({"path": "README.md", "content": "y", "message": "m"})),
            finish("done", true),
        ]));

        let result = AgentLoop::new(model.clone(), repo).run(&objective(), 10).await;

        assert_eq!(result.outcome, RunOutcome::Failed);
        assert_eq!(result.iterations, 1);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_pull_request_failure_keeps_progress() {
        let repo = Arc::new(
            MemoryRepository::new("acme/widgets")
                .with_file("README.md", "x")
                .fail_on(FailPoint::PullRequest),
        );
        let model = Arc::new(MockModelBackend::with_actions(vec![
            tool("update_file", json!({"path": "README.md", "content": "y", "message": "m"})),
            finish("done", true),
        ]));

        let result = AgentLoop::new(model, repo).run(&objective(), 10).await;

        assert_eq!(result.outcome, RunOutcome::Failed);
        assert!(!result.success);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.files_list(), vec!["README.md"]);
        assert!(result.summary.contains("done"));
    }

    #[tokio::test]
    async fn test_model_timeout_fails_run() {
        let model = Arc::new(
            MockModelBackend::with_actions(vec![finish("late", true)]).with_delay(Duration::from_millis(200)),
        );
        let config = AgentLoopConfig {
            call_timeout: Some(Duration::from_millis(10)),
            create_pr: true,
        };

        let result = AgentLoop::with_config(model, repo(), config).run(&objective(), 5).await;

        assert_eq!(result.outcome, RunOutcome::Failed);
        assert!(result.summary.contains("timed out"));
    }
}
