//! Model backend seam used by the agent loop
//!
//! The loop never sees raw completions. A `ModelBackend` takes the whole
//! conversation plus the tool schemas and answers with the next action.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Conversation, Turn};
use crate::llm::client::{LlmClient, LlmError};
use crate::llm::tool_parser;
use crate::llm::types::{CompletionRequest, Message, ToolCall, ToolDefinition};

/// Model's final report for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSignal {
    pub summary: String,
    pub success: bool,
}

/// What the model wants to happen next
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    /// Run a tool; `thought` is any text sent alongside the call
    ToolCall { thought: Option<String>, call: ToolCall },
    /// Stop and report
    Complete(CompletionSignal),
}

/// Stateless decision maker: the full conversation goes in on every call
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn next_action(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<NextAction, LlmError>;
}

/// Backend over a chat-completions client
pub struct ChatModelBackend<L: LlmClient + ?Sized> {
    client: Arc<L>,
    max_tokens: Option<u32>,
}

impl<L: LlmClient + ?Sized> ChatModelBackend<L> {
    pub fn new(client: Arc<L>) -> Self {
        Self {
            client,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Render the conversation as chat messages
    pub fn to_messages(conversation: &Conversation) -> Vec<Message> {
        conversation
            .turns()
            .iter()
            .map(|turn| match turn {
                Turn::System { content } => Message::system(content.clone()),
                Turn::Objective { content } => Message::user(content.clone()),
                Turn::Action { thought, call } => {
                    Message::assistant_tool_call(thought.clone(), call.clone())
                }
                Turn::Observation { call_id, result } => {
                    Message::tool(call_id.clone(), result.to_observation())
                }
            })
            .collect()
    }
}

#[async_trait]
impl<L: LlmClient + ?Sized> ModelBackend for ChatModelBackend<L> {
    async fn next_action(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<NextAction, LlmError> {
        let request = CompletionRequest {
            messages: Self::to_messages(conversation),
            tools: tools.to_vec(),
            max_tokens: self.max_tokens,
            model: None,
            require_tool: true,
        };

        let response = self.client.complete(request).await?;
        log::debug!(
            "Model {} replied: {} tool call(s), {} tokens",
            self.client.model(),
            response.tool_calls.len(),
            response.usage.total()
        );
        tool_parser::next_action(&response, conversation.action_count() + 1)
    }
}

/// Scripted backend for tests
pub struct MockModelBackend {
    script: Mutex<VecDeque<Result<NextAction, LlmError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    panic_on_call: Option<usize>,
}

impl MockModelBackend {
    pub fn new(script: Vec<Result<NextAction, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            delay: None,
            panic_on_call: None,
        }
    }

    /// Script of successful actions only
    pub fn with_actions(actions: Vec<NextAction>) -> Self {
        Self::new(actions.into_iter().map(Ok).collect())
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panic on the given 1-based call number
    pub fn panicking_on(mut self, call: usize) -> Self {
        self.panic_on_call = Some(call);
        self
    }

    /// Number of times `next_action` was invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for MockModelBackend {
    async fn next_action(
        &self,
        _conversation: &Conversation,
        _tools: &[ToolDefinition],
    ) -> Result<NextAction, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.panic_on_call == Some(call) {
            panic!("mock model backend crashed on call {}", call);
        }

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("mock script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::MockLlmClient;
    use crate::llm::types::{CompletionResponse, Role};
    use crate::tools::ToolResult;
    use serde_json::json;

    #[test]
    fn test_to_messages_maps_every_turn() {
        let mut conv = Conversation::new("system text", "objective text");
        conv.append_exchange(
            Some("checking".to_string()),
            ToolCall::new("call_1", "read_file", json!({"path": "README.md"})),
            ToolResult::ok(json!({"content": "hello"})),
        );

        let messages = ChatModelBackend::<MockLlmClient>::to_messages(&conv);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content.as_deref(), Some("objective text"));
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].tool_calls[0].id, "call_1");
        assert_eq!(messages[3].role, Role::Tool);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(messages[3].content.as_deref().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn test_chat_backend_sends_full_transcript_with_tools() {
        let client = Arc::new(MockLlmClient::new(vec![CompletionResponse::tool_call(
            ToolCall::new("c1", "get_directory", json!({})),
        )]));
        let backend = ChatModelBackend::new(client.clone()).with_max_tokens(512);
        let tools = vec![ToolDefinition::new("get_directory", "List", json!({"type": "object"}))];

        let action = backend
            .next_action(&Conversation::new("sys", "obj"), &tools)
            .await
            .unwrap();

        assert!(matches!(action, NextAction::ToolCall { .. }));
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        assert!(requests[0].require_tool);
        assert_eq!(requests[0].max_tokens, Some(512));
    }

    #[tokio::test]
    async fn test_chat_backend_rejects_text_only_reply() {
        let client = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("no tools today")]));
        let backend = ChatModelBackend::new(client);

        let result = backend.next_action(&Conversation::new("s", "o"), &[]).await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_chat_backend_numbers_text_calls_by_turn() {
        let reply = r#"{"tool": "read_file", "parameters": {"path": "README.md"}}"#;
        let client = Arc::new(MockLlmClient::new(vec![
            CompletionResponse::text(reply),
            CompletionResponse::text(reply),
        ]));
        let backend = ChatModelBackend::new(client);
        let mut conv = Conversation::new("s", "o");

        let first = match backend.next_action(&conv, &[]).await.unwrap() {
            NextAction::ToolCall { call, .. } => call,
            other => panic!("expected tool call, got {:?}", other),
        };
        conv.append_exchange(None, first.clone(), ToolResult::ok(json!({"content": "hi"})));

        let second = match backend.next_action(&conv, &[]).await.unwrap() {
            NextAction::ToolCall { call, .. } => call,
            other => panic!("expected tool call, got {:?}", other),
        };
        assert_eq!(first.id, "call_from_text_1");
        assert_eq!(second.id, "call_from_text_2");
    }

    #[tokio::test]
    async fn test_mock_backend_counts_and_exhausts() {
        let backend = MockModelBackend::with_actions(vec![NextAction::Complete(CompletionSignal {
            summary: "done".to_string(),
            success: true,
        })]);
        let conv = Conversation::new("s", "o");

        assert!(backend.next_action(&conv, &[]).await.is_ok());
        assert!(backend.next_action(&conv, &[]).await.is_err());
        assert_eq!(backend.calls(), 2);
    }
}
