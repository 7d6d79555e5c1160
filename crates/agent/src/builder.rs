//! Agent construction

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use analyzer_llm::{create_client, LlmConfig, ModelClient};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::agent::Agent;
use crate::prompt::PromptTemplate;
use crate::schema::OutputSchema;
use crate::tools::{Tool, ToolRegistry};
use crate::BuildError;

/// Collects an agent's configuration and validates it in [`build`](Self::build).
pub struct AgentBuilder<T> {
    name: String,
    behavior: String,
    schema: Option<Value>,
    llm_config: Option<LlmConfig>,
    client: Option<Arc<dyn ModelClient>>,
    tools: ToolRegistry,
    limits: BTreeMap<String, u32>,
    template: PromptTemplate,
    _output: PhantomData<fn() -> T>,
}

impl<T> AgentBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: String::new(),
            schema: None,
            llm_config: None,
            client: None,
            tools: ToolRegistry::new(),
            limits: BTreeMap::new(),
            template: PromptTemplate::default(),
            _output: PhantomData,
        }
    }

    pub fn behavior(mut self, behavior: impl Into<String>) -> Self {
        self.behavior = behavior.into();
        self
    }

    /// Replace the schema derived from `T`
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Build the model client from configuration. Ignored when a client is
    /// injected with [`model_client`](Self::model_client).
    pub fn llm_config(mut self, config: LlmConfig) -> Self {
        self.llm_config = Some(config);
        self
    }

    pub fn model_client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn tool<U: Tool + 'static>(mut self, tool: U) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tool_limit(mut self, name: impl Into<String>, limit: u32) -> Self {
        self.limits.insert(name.into(), limit);
        self
    }

    pub fn tool_limits<I, S>(mut self, limits: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        self.limits
            .extend(limits.into_iter().map(|(name, limit)| (name.into(), limit)));
        self
    }

    pub fn prompt_template(mut self, template: impl Into<PromptTemplate>) -> Self {
        self.template = template.into();
        self
    }
}

impl<T: JsonSchema + DeserializeOwned> AgentBuilder<T> {
    pub fn build(self) -> Result<Agent<T>, BuildError> {
        if self.template.is_blank() {
            return Err(BuildError::EmptyTemplate);
        }

        if let Some(name) = self.limits.keys().find(|name| !self.tools.has(name)) {
            return Err(BuildError::UnknownToolLimit(name.clone()));
        }

        let schema = match self.schema {
            Some(value) => OutputSchema::from_value(value)?,
            None => OutputSchema::of::<T>()?,
        };

        let client: Arc<dyn ModelClient> = match (self.client, &self.llm_config) {
            (Some(client), _) => client,
            (None, Some(config)) => create_client(config, self.tools.definitions())?,
            (None, None) => return Err(BuildError::MissingModel),
        };

        debug!(
            agent = %self.name,
            tools = ?self.tools.names(),
            limits = ?self.limits,
            "Agent built"
        );

        let agent = Agent::new(
            self.name,
            self.behavior,
            schema,
            self.tools,
            self.limits,
            self.template,
            client,
        );

        // Surface template mistakes now rather than on the first run.
        agent.system_prompt(&agent.fresh_usage())?;
        Ok(agent)
    }
}
