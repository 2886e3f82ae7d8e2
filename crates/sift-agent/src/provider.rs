//! Model-provider boundary
//!
//! A [`ChatClient`] turns one conversational step into a completion: given
//! the system instructions, transcript, and active tool metadata, it returns
//! assistant text and/or tool call requests. Provider and transport
//! failures here are the only loop-fatal errors in a run.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use sift_core::ToolMeta;

const MAX_CONTENT_LOG_CHARS: usize = 2_000;

/// One tool invocation proposed by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed back with the result
    pub id: String,
    /// Wire name of the tool
    pub name: String,
    /// JSON arguments; malformed provider output degrades to a raw string
    /// and fails parameter validation downstream instead of killing the run
    pub arguments: Value,
}

/// One message of the run transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            content,
            tool_calls,
        }
    }

    /// Create a tool result message from a tool's JSON result value
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        result: &Value,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: result.to_string(),
        }
    }
}

/// One conversational step's request to the provider
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    /// Per-step system instructions (selected by phase)
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// Active tools for this step
    pub tools: Vec<ToolMeta>,
}

/// The provider's completion for one step
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatCompletion {
    /// A text-only completion (no tool calls)
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Append a tool call; ids are generated sequentially
    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: Value) -> Self {
        let id = format!("call_{}", self.tool_calls.len() + 1);
        self.tool_calls.push(ToolCallRequest {
            id,
            name: name.into(),
            arguments,
        });
        self
    }
}

/// Provider errors. These are fatal to the current run.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Chat client trait
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError>;
}

#[async_trait]
impl ChatClient for std::sync::Arc<dyn ChatClient> {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        (**self).complete(request).await
    }
}

/// HTTP client config (OpenAI-compatible chat completions)
#[derive(Debug, Clone)]
pub struct HttpChatClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpChatClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// HTTP chat client using an OpenAI-compatible API with tool calling
pub struct HttpChatClient {
    client: reqwest::Client,
    config: HttpChatClientConfig,
}

impl HttpChatClient {
    pub fn new(config: HttpChatClientConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Serialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object, per the chat-completions dialect
    arguments: String,
}

#[derive(Serialize)]
struct WireToolDef {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef,
}

#[derive(Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireToolDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireResponseToolCall>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunction,
}

#[derive(Deserialize)]
struct WireResponseFunction {
    name: String,
    arguments: String,
}

fn wire_messages(request: &ChatRequest) -> Vec<WireMessage> {
    let mut out = Vec::with_capacity(request.messages.len() + 1);
    out.push(WireMessage {
        role: "system",
        content: Some(request.system.clone()),
        tool_calls: Vec::new(),
        tool_call_id: None,
        name: None,
    });
    for message in &request.messages {
        out.push(match message {
            ChatMessage::User { content } => WireMessage {
                role: "user",
                content: Some(content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: None,
                name: None,
            },
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => WireMessage {
                role: "assistant",
                content: content.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        kind: "function",
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
                tool_call_id: None,
                name: None,
            },
            ChatMessage::Tool {
                tool_call_id,
                name,
                content,
            } => WireMessage {
                role: "tool",
                content: Some(content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(tool_call_id.clone()),
                name: Some(name.clone()),
            },
        });
    }
    out
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let body = WireRequest {
            model: request.model.clone(),
            messages: wire_messages(&request),
            temperature: request.temperature,
            tools: request
                .tools
                .iter()
                .map(|meta| WireToolDef {
                    kind: "function",
                    function: WireFunctionDef {
                        name: meta.name.clone(),
                        description: meta.description.clone(),
                        parameters: meta.input_schema.clone(),
                    },
                })
                .collect(),
            tool_choice: if request.tools.is_empty() {
                None
            } else {
                Some("auto")
            },
        };

        let mut http = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Response(format!(
                "HTTP {}: {}",
                status,
                truncate_for_log(&text, MAX_CONTENT_LOG_CHARS)
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        let parsed: WireResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Serialization(e.to_string()))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ProviderError::Response("Missing choices".to_string()))?;

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
            })
            .collect();

        Ok(ChatCompletion {
            content: message.content,
            tool_calls,
        })
    }
}

/// What the mock client saw in one request, for test assertions
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system: String,
    pub tool_names: Vec<String>,
    pub message_count: usize,
}

/// Scripted chat client for tests and examples
pub struct MockChatClient {
    completions: Mutex<VecDeque<ChatCompletion>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockChatClient {
    /// Create a client that replays the given completions in order
    pub fn new(completions: Vec<ChatCompletion>) -> Self {
        Self {
            completions: Mutex::new(completions.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests observed so far
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|reqs| reqs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ProviderError> {
        self.requests
            .lock()
            .map_err(|e| ProviderError::Response(e.to_string()))?
            .push(RecordedRequest {
                system: request.system.clone(),
                tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
                message_count: request.messages.len(),
            });

        self.completions
            .lock()
            .map_err(|e| ProviderError::Response(e.to_string()))?
            .pop_front()
            .ok_or_else(|| {
                ProviderError::Response("mock client has no completion scripted for this step".to_string())
            })
    }
}
