//! Shared fixtures for agent integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use analyzer_agent::{parse_args, FnTool, ToolError};
use analyzer_llm::{LlmError, Message, ModelClient, ToolCall};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize, JsonSchema, PartialEq)]
pub struct Sum {
    pub sum: i64,
}

/// One scripted model turn
pub enum Step {
    Reply(Message),
    Fail(LlmError),
    /// Block until the run is cancelled
    Hang,
}

/// Model client that plays back a fixed script and records what it saw
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedClient {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn replies(messages: Vec<Message>) -> Arc<Self> {
        Self::new(messages.into_iter().map(Step::Reply).collect())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn call(
        &self,
        cancel: &CancellationToken,
        messages: &[Message],
    ) -> analyzer_llm::Result<Message> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(message)) => Ok(message),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => {
                cancel.cancelled().await;
                Err(LlmError::Cancelled)
            }
            None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
        }
    }
}

pub fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, args(arguments))
}

/// Assistant turn requesting the given tool calls
pub fn request(calls: Vec<ToolCall>) -> Message {
    Message::assistant("").with_tool_calls(calls)
}

#[derive(Deserialize)]
struct Pair {
    num1: i64,
    num2: i64,
}

/// `add` tool that counts its invocations
pub fn add_tool(counter: Arc<AtomicUsize>) -> FnTool {
    FnTool::new(
        "add",
        "Adds num1 and num2",
        json!({
            "type": "object",
            "properties": {
                "num1": {"type": "integer"},
                "num2": {"type": "integer"}
            },
            "required": ["num1", "num2"]
        }),
        move |_, args| {
            counter.fetch_add(1, Ordering::SeqCst);
            let pair: Pair = parse_args(args)?;
            Ok(json!({"sum": pair.num1 + pair.num2}))
        },
    )
}

/// Tool that always fails
pub fn broken_tool(name: &str, counter: Arc<AtomicUsize>) -> FnTool {
    FnTool::new(name, "Always fails", json!({"type": "object"}), move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err::<Value, _>(ToolError::failed("disk on fire"))
    })
}

/// Tool that echoes its call id
pub fn echo_tool(name: &str) -> FnTool {
    FnTool::new(name, "Echoes the call id", json!({"type": "object"}), |id, _| {
        Ok(json!({"id": id}))
    })
}
