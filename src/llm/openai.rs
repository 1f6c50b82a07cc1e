//! OpenAI / Azure OpenAI chat-completions client
//!
//! This module implements the LlmClient trait for the chat-completions API,
//! either on api.openai.com (or a compatible base URL) or on an Azure OpenAI
//! deployment.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, Usage};

/// Default OpenAI API base URL
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default model to use
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Where requests are sent and how they authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// OpenAI-compatible API, bearer auth
    OpenAi { base_url: String },
    /// Azure OpenAI deployment, `api-key` header auth
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::OpenAi {
            base_url: OPENAI_API_BASE.to_string(),
        }
    }
}

/// Configuration for the OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: Endpoint,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(300),
        }
    }
}

impl OpenAiConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Chat-completions API client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
    usage: Arc<Mutex<Usage>>,
}

impl OpenAiClient {
    /// Create a client reading the API key from `api_key_env`
    pub fn from_env(api_key_env: &str, config: OpenAiConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(api_key_env).map_err(|_| LlmError::MissingApiKey {
            env_var: api_key_env.to_string(),
        })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    /// Full URL for the chat-completions call
    fn endpoint_url(&self) -> String {
        match &self.config.endpoint {
            Endpoint::OpenAi { base_url } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Endpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
        }
    }

    /// Encode one message in the chat-completions wire shape
    fn encode_message(message: &Message) -> Value {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let mut encoded = json!({
            "role": role,
            "content": message.content
        });

        if !message.tool_calls.is_empty() {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": {
                            "name": c.name,
                            "arguments": c.input.to_string()
                        }
                    })
                })
                .collect();
            encoded["tool_calls"] = json!(calls);
        }

        if let Some(id) = &message.tool_call_id {
            encoded["tool_call_id"] = json!(id);
        }

        encoded
    }

    /// Build the request body for the chat-completions API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model).clone();
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);
        let messages: Vec<Value> = request.messages.iter().map(Self::encode_message).collect();

        let mut body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": messages
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(|t| t.to_openai_schema()).collect();
            body["tools"] = json!(tools);
            body["parallel_tool_calls"] = json!(false);
            if request.require_tool {
                body["tool_choice"] = json!("required");
            }
        }

        body
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let choice = body["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let stop_reason = match choice["finish_reason"].as_str() {
            Some("tool_calls") | Some("function_call") => StopReason::ToolCalls,
            Some("length") => StopReason::Length,
            Some("content_filter") => StopReason::ContentFilter,
            _ => StopReason::Stop,
        };

        let usage = if let Some(u) = body.get("usage") {
            Usage::new(
                u["prompt_tokens"].as_u64().unwrap_or(0),
                u["completion_tokens"].as_u64().unwrap_or(0),
            )
        } else {
            Usage::default()
        };

        self.usage
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add(&usage);

        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let id = call["id"].as_str().unwrap_or("").to_string();
                let name = call["function"]["name"].as_str().unwrap_or("").to_string();
                let raw_args = call["function"]["arguments"].as_str().unwrap_or("{}");
                // Unparseable arguments stay visible to argument validation
                let input = serde_json::from_str(raw_args).unwrap_or_else(|_| Value::String(raw_args.to_string()));
                tool_calls.push(ToolCall::new(id, name, input));
            }
        }

        Ok(CompletionResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
        })
    }

    /// Send a request to the API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let builder = self.client.post(self.endpoint_url()).json(&body);
        let builder = match self.config.endpoint {
            Endpoint::OpenAi { .. } => builder.bearer_auth(&self.api_key),
            Endpoint::Azure { .. } => builder.header("api-key", &self.api_key),
        };

        let response = builder.send().await?;
        let status = response.status();

        // Handle rate limiting
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        // Handle other errors
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}
