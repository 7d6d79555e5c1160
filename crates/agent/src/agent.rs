//! Agent loop
//!
//! One run is: render the system prompt, send the conversation to the
//! model, execute any requested tools, and repeat until the model marks a
//! message as terminal or every limited tool is used up. Once the limits are
//! used up the model gets one closing turn in which no tools run. The final
//! assistant message is then decoded into `T`.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use analyzer_llm::{LlmError, Message, ModelClient, ToolCall, ToolResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::builder::AgentBuilder;
use crate::prompt::{
    PromptError, PromptTemplate, VAR_BEHAVIOR, VAR_CALLING_LIMITS, VAR_OUTPUT_SCHEMA, VAR_TOOLS,
    VAR_TOOLS_USAGE,
};
use crate::schema::{OutputSchema, SchemaError};
use crate::state::{Conversation, Usage};
use crate::tools::{Tool, ToolError, ToolRegistry};
use crate::{AgentError, RunError};

/// Appended to the system prompt for the closing turn after the limits run out
pub const LIMITS_EXHAUSTED_NOTICE: &str = "TOOL LIMITS EXHAUSTED: no more tool calls will be executed. \
Reply now with the final JSON result.";

/// Why a successful run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model sent a terminal message
    Finished,
    /// Every limited tool hit its ceiling
    LimitReached,
}

/// Outcome of a successful run
#[derive(Debug)]
pub struct AgentResult<T> {
    pub data: T,
    pub messages: Vec<Message>,
    pub usage: Usage,
    pub stop: StopReason,
}

/// A configured agent.
///
/// Immutable once built. Every call to [`Agent::run`] owns its own
/// conversation and usage counters, so one agent can serve concurrent runs.
pub struct Agent<T> {
    name: String,
    behavior: String,
    schema: OutputSchema,
    tools: ToolRegistry,
    limits: BTreeMap<String, u32>,
    template: PromptTemplate,
    client: Arc<dyn ModelClient>,
    _output: PhantomData<fn() -> T>,
}

impl<T> Agent<T> {
    pub(crate) fn new(
        name: String,
        behavior: String,
        schema: OutputSchema,
        tools: ToolRegistry,
        limits: BTreeMap<String, u32>,
        template: PromptTemplate,
        client: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            name,
            behavior,
            schema,
            tools,
            limits,
            template,
            client,
            _output: PhantomData,
        }
    }

    pub fn builder(name: impl Into<String>) -> AgentBuilder<T> {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> &str {
        &self.behavior
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn limits(&self) -> &BTreeMap<String, u32> {
        &self.limits
    }

    pub fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    /// Zeroed counters for every registered tool
    pub fn fresh_usage(&self) -> Usage {
        Usage::for_tools(self.tools.names())
    }

    /// Render the system prompt for the given usage
    pub fn system_prompt(&self, usage: &Usage) -> Result<String, PromptError> {
        let mut vars = BTreeMap::new();
        vars.insert(VAR_TOOLS, to_json(&self.tools.describe())?);
        vars.insert(VAR_TOOLS_USAGE, to_json(usage)?);
        vars.insert(VAR_CALLING_LIMITS, to_json(&self.limits)?);
        vars.insert(VAR_OUTPUT_SCHEMA, self.schema.rendered().to_string());
        vars.insert(VAR_BEHAVIOR, self.behavior.clone());
        self.template.render(&vars)
    }
}

impl<T> fmt::Debug for Agent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

fn to_json<S: Serialize>(value: &S) -> Result<String, PromptError> {
    serde_json::to_string(value).map_err(|e| PromptError::Serialize(e.to_string()))
}

impl<T: DeserializeOwned> Agent<T> {
    /// Run the agent on `input` until it finishes, fails or is cancelled
    pub async fn run<I>(
        &self,
        cancel: &CancellationToken,
        input: &I,
    ) -> Result<AgentResult<T>, RunError>
    where
        I: Serialize + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("agent_run", agent = %self.name, %run_id);
        self.drive(cancel, input).instrument(span).await
    }

    /// Run with a deadline; the run is cancelled when it expires
    pub async fn run_with_timeout<I>(
        &self,
        input: &I,
        timeout: Duration,
    ) -> Result<AgentResult<T>, RunError>
    where
        I: Serialize + ?Sized,
    {
        let cancel = CancellationToken::new();
        let deadline = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        let result = self.run(&cancel, input).await;
        deadline.abort();
        result
    }

    async fn drive<I>(&self, cancel: &CancellationToken, input: &I) -> Result<AgentResult<T>, RunError>
    where
        I: Serialize + ?Sized,
    {
        let user = serde_json::to_string(input)
            .map_err(|e| RunError::new(AgentError::Input(e), Vec::new()))?;
        let mut usage = self.fresh_usage();
        let system = self
            .system_prompt(&usage)
            .map_err(|e| RunError::new(e.into(), Vec::new()))?;
        let mut conversation = Conversation::new(system, user);

        info!(tools = self.tools.len(), limits = self.limits.len(), "Agent run started");

        let mut turn: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(fail(AgentError::Cancelled, conversation));
            }

            let closing = usage.all_exhausted(&self.limits);
            if closing {
                let after_tools = conversation
                    .last_assistant()
                    .is_some_and(|m| m.has_tool_calls());
                if !after_tools {
                    warn!(turn, "All limited tools exhausted, stopping");
                    return self.finish_limited(conversation, usage);
                }

                warn!(turn, "All limited tools exhausted, asking for the final result");
                match self.system_prompt(&usage) {
                    Ok(prompt) => {
                        conversation.replace_system(format!("{prompt}\n{LIMITS_EXHAUSTED_NOTICE}"))
                    }
                    Err(e) => return Err(fail(e.into(), conversation)),
                }
            }

            turn += 1;
            debug!(turn, messages = conversation.len(), "Calling model");

            let mut message = match self.client.call(cancel, conversation.messages()).await {
                Ok(message) => message,
                Err(LlmError::Cancelled) => return Err(fail(AgentError::Cancelled, conversation)),
                Err(e) => return Err(fail(AgentError::ModelCall(e), conversation)),
            };

            if closing {
                let requested = message.has_tool_calls();
                if requested {
                    warn!(
                        turn,
                        tool_calls = message.tool_calls.len(),
                        "Tool calls after limits were exhausted are not executed"
                    );
                }
                let finished = message.end && !requested;
                conversation.push(message);

                if finished {
                    return self.finish_terminal(conversation, usage);
                }
                return self.finish_limited(conversation, usage);
            }

            if message.has_tool_calls() {
                match self.dispatch(cancel, &message.tool_calls, &mut usage).await {
                    Ok(results) => message.tool_results = results,
                    Err(e) => {
                        conversation.push(message);
                        return Err(fail(e, conversation));
                    }
                }
            }

            let terminal = message.end;
            conversation.push(message);

            if terminal {
                return self.finish_terminal(conversation, usage);
            }

            match self.system_prompt(&usage) {
                Ok(prompt) => conversation.replace_system(prompt),
                Err(e) => return Err(fail(e.into(), conversation)),
            }
        }
    }

    /// Resolve every call first, then invoke them in order.
    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        calls: &[ToolCall],
        usage: &mut Usage,
    ) -> crate::Result<Vec<ToolResult>> {
        let resolved = calls
            .iter()
            .map(|call| {
                self.tools
                    .get(&call.name)
                    .map(|tool| (call, tool))
                    .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))
            })
            .collect::<crate::Result<Vec<(&ToolCall, &dyn Tool)>>>()?;

        let mut results = Vec::with_capacity(resolved.len());
        for (call, tool) in resolved {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            debug!(tool = %call.name, id = %call.id, "Invoking tool");
            let payload = tool
                .call(cancel, &call.id, &call.arguments)
                .await
                .map_err(|source| match source {
                    ToolError::Cancelled => AgentError::Cancelled,
                    source => AgentError::Tool {
                        name: call.name.clone(),
                        source,
                    },
                })?;

            usage.increment(&call.name);
            results.push(ToolResult::new(&call.id, &call.name, payload));
        }
        Ok(results)
    }

    fn finish_terminal(
        &self,
        conversation: Conversation,
        usage: Usage,
    ) -> Result<AgentResult<T>, RunError> {
        self.finish(conversation, usage, StopReason::Finished)
            .map_err(|(e, conversation)| fail(AgentError::InvalidResultSchema(e), conversation))
    }

    fn finish_limited(
        &self,
        conversation: Conversation,
        usage: Usage,
    ) -> Result<AgentResult<T>, RunError> {
        self.finish(conversation, usage, StopReason::LimitReached)
            .map_err(|(e, conversation)| fail(AgentError::LimitReached(e), conversation))
    }

    fn finish(
        &self,
        conversation: Conversation,
        usage: Usage,
        stop: StopReason,
    ) -> Result<AgentResult<T>, (SchemaError, Conversation)> {
        let extracted = match conversation.last_assistant() {
            Some(message) => self.schema.extract(&message.content),
            None => Err(SchemaError::Missing),
        };

        match extracted {
            Ok(data) => {
                info!(?stop, "Agent run finished");
                Ok(AgentResult {
                    data,
                    messages: conversation.into_messages(),
                    usage,
                    stop,
                })
            }
            Err(e) => Err((e, conversation)),
        }
    }
}

fn fail(error: AgentError, conversation: Conversation) -> RunError {
    warn!(%error, "Agent run failed");
    RunError::new(error, conversation.into_messages())
}
