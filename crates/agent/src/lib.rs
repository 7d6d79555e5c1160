//! Agent execution core
//!
//! Drives a language model through a tool-calling conversation until it
//! produces a result matching the caller's output type.
//!
//! ```no_run
//! # use analyzer_agent::{Agent, FnTool, parse_args};
//! # use analyzer_llm::LlmConfig;
//! # use serde::Deserialize;
//! # use serde_json::json;
//! #[derive(Deserialize, schemars::JsonSchema)]
//! struct Sum {
//!     sum: i64,
//! }
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let agent = Agent::<Sum>::builder("calc")
//!     .behavior("Add the two numbers using the add tool")
//!     .llm_config(LlmConfig::default())
//!     .tool(FnTool::new("add", "Adds two numbers", json!({"type": "object"}), |_, args| {
//!         #[derive(Deserialize)]
//!         struct Pair { num1: i64, num2: i64 }
//!         let pair: Pair = parse_args(args)?;
//!         Ok(json!({"sum": pair.num1 + pair.num2}))
//!     }))
//!     .tool_limit("add", 1)
//!     .build()?;
//!
//! let result = agent.run(&Default::default(), &json!({"num1": 3, "num2": 5})).await?;
//! assert_eq!(result.data.sum, 8);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use analyzer_llm::{LlmError, Message};
use thiserror::Error;

pub mod agent;
pub mod builder;
pub mod prompt;
pub mod schema;
pub mod state;
pub mod tools;

pub use agent::{Agent, AgentResult, StopReason, LIMITS_EXHAUSTED_NOTICE};
pub use builder::AgentBuilder;
pub use prompt::{PromptError, PromptTemplate, DEFAULT_TEMPLATE};
pub use schema::{OutputSchema, SchemaError};
pub use state::{Conversation, Usage};
pub use tools::{parse_args, FnTool, Tool, ToolError, ToolRegistry};

pub use analyzer_llm::{ModelClient, Role, ToolCall, ToolResult};
pub use tokio_util::sync::CancellationToken;

/// Agent construction errors
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("no model configured: set llm_config or model_client")]
    MissingModel,

    #[error("limit configured for unregistered tool '{0}'")]
    UnknownToolLimit(String),

    #[error("prompt template is empty")]
    EmptyTemplate,

    #[error("prompt template cannot be rendered: {0}")]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("model backend: {0}")]
    Llm(#[from] LlmError),
}

/// Run failures
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("tool limits reached without a valid result: {0}")]
    LimitReached(#[source] SchemaError),

    #[error("model call failed: {0}")]
    ModelCall(#[source] LlmError),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool '{name}' failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: ToolError,
    },

    #[error("invalid result: {0}")]
    InvalidResultSchema(#[source] SchemaError),

    #[error("prompt rendering failed: {0}")]
    Prompt(#[from] PromptError),

    #[error("input is not serializable: {0}")]
    Input(#[source] serde_json::Error),

    #[error("run cancelled")]
    Cancelled,
}

/// A failed run together with the transcript up to the failure
#[derive(Debug)]
pub struct RunError {
    pub error: AgentError,
    pub messages: Vec<Message>,
}

impl RunError {
    pub fn new(error: AgentError, messages: Vec<Message>) -> Self {
        Self { error, messages }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
