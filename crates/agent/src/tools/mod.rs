//! Tools the model may call during a run

pub mod function;

pub use function::FnTool;

use async_trait::async_trait;
use analyzer_llm::ToolDef;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Tool invocation errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),

    #[error("tool call cancelled")]
    Cancelled,

    #[error("result is not serializable: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ToolError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        ToolError::InvalidArguments(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        ToolError::Failed(msg.into())
    }
}

/// A named capability the model can invoke.
///
/// `parameters` is advertised to the model as JSON Schema but is not
/// enforced by the agent; implementations validate their own arguments.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn call(
        &self,
        cancel: &CancellationToken,
        id: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, ToolError>;
}

pub fn to_tool_def(tool: &dyn Tool) -> ToolDef {
    ToolDef::new(tool.name(), tool.description(), tool.parameters())
}

/// Deserialize a tool's argument map into a typed struct
pub fn parse_args<A: DeserializeOwned>(args: &Map<String, Value>) -> Result<A, ToolError> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

type BoxedTool = Box<dyn Tool>;

/// Name-keyed tool registry, ordered by name
pub struct ToolRegistry {
    tools: BTreeMap<String, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool under its own name, replacing any previous one
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(Box::new(tool));
    }

    pub fn register_boxed(&mut self, tool: BoxedTool) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.values().map(|t| to_tool_def(t.as_ref())).collect()
    }

    /// Definitions keyed by name, as shown to the model in the system prompt
    pub fn describe(&self) -> BTreeMap<String, ToolDef> {
        self.tools
            .iter()
            .map(|(name, t)| (name.clone(), to_tool_def(t.as_ref())))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
