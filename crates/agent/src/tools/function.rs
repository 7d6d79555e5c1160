//! Closure-backed tools

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::{Tool, ToolError};

type Handler = Box<dyn Fn(&str, &Map<String, Value>) -> Result<Value, ToolError> + Send + Sync>;

/// A tool whose invocation is a synchronous closure.
///
/// The closure receives the call id and the argument map and may return any
/// serializable value; it is converted to JSON for the model.
pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Handler,
}

impl FnTool {
    pub fn new<F, R>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&str, &Map<String, Value>) -> Result<R, ToolError> + Send + Sync + 'static,
        R: Serialize,
    {
        let handler: Handler = Box::new(move |id: &str, args: &Map<String, Value>| {
            let output = handler(id, args)?;
            Ok(serde_json::to_value(output)?)
        });

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler,
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(
        &self,
        cancel: &CancellationToken,
        id: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        (self.handler)(id, args)
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
