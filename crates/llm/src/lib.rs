//! Language model contract
//!
//! Conversation messages, tool-call wire types and the [`ModelClient`]
//! capability the agent core drives. Concrete backends live in submodules.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod openai;

pub use openai::OpenAiClient;

/// Model backend errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("no API key configured")]
    NoApiKey,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("unsupported model backend: {0}")]
    UnsupportedKind(String),

    #[error("model call cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(s)
    }
}

/// Tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool invocation, correlated to its [`ToolCall`] by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub payload: Value,
}

impl ToolResult {
    pub fn new(id: impl Into<String>, name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            payload,
        }
    }
}

/// One entry of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    /// Set when the model considers its task complete.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub end: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            end: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Terminal assistant message carrying the final answer
    pub fn finish(content: impl Into<String>) -> Self {
        Self {
            end: true,
            ..Self::assistant(content)
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Tool description advertised to the model backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// The capability the agent core consumes.
///
/// Implementations return the next assistant message for the given
/// conversation. The terminal flag must be set when the model intends to
/// finish and the tool-call list must be empty when no tool is requested.
/// Retry policy, if any, belongs here rather than in the agent loop.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call(&self, cancel: &CancellationToken, messages: &[Message]) -> Result<Message>;
}

#[async_trait]
impl<C: ModelClient + ?Sized> ModelClient for Arc<C> {
    async fn call(&self, cancel: &CancellationToken, messages: &[Message]) -> Result<Message> {
        (**self).call(cancel, messages).await
    }
}

/// Supported model backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmKind {
    #[default]
    OpenAi,
}

impl FromStr for LlmKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmKind::OpenAi),
            other => Err(LlmError::UnsupportedKind(other.to_string())),
        }
    }
}

/// Backend selection and credentials
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub kind: LlmKind,
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            kind: LlmKind::OpenAi,
            api_key: String::new(),
            api_base: None,
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Build the client for the configured backend, advertising `tools` to it.
pub fn create_client(config: &LlmConfig, tools: Vec<ToolDef>) -> Result<Arc<dyn ModelClient>> {
    match config.kind {
        LlmKind::OpenAi => Ok(Arc::new(OpenAiClient::new(config, tools)?)),
    }
}
