//! OpenAI-compatible chat completions backend.

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, trace, warn};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Finish reasons that mean the model is done talking.
const TERMINAL_FINISH_REASONS: &[&str] = &["stop", "length"];

/// Chat completions client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    tools: Vec<ToolDef>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, tools: Vec<ToolDef>) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::NoApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        let api_base = config
            .api_base
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            tools,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, messages: &[Message]) -> Value {
        let mut wire = Vec::with_capacity(messages.len());
        for m in messages {
            match m.role {
                Role::System | Role::User => {
                    wire.push(json!({ "role": m.role.to_string(), "content": &m.content }));
                }
                Role::Assistant => {
                    let mut obj = json!({ "role": "assistant", "content": &m.content });
                    if m.has_tool_calls() {
                        let calls: Vec<Value> = m
                            .tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": &tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": &tc.name,
                                        "arguments": Value::Object(tc.arguments.clone()).to_string()
                                    }
                                })
                            })
                            .collect();
                        obj["tool_calls"] = json!(calls);
                    }
                    wire.push(obj);

                    // The API wants every answered call echoed back as a tool message.
                    for result in &m.tool_results {
                        wire.push(json!({
                            "role": "tool",
                            "tool_call_id": &result.id,
                            "name": &result.name,
                            "content": result.payload.to_string()
                        }));
                    }
                }
            }
        }

        let mut body = json!({
            "model": &self.model,
            "messages": wire,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        if !self.tools.is_empty() {
            let tools: Vec<Value> = self
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": &t.name,
                            "description": &t.description,
                            "parameters": &t.parameters
                        }
                    })
                })
                .collect();

            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    fn parse_response(&self, json: Value) -> Result<Message> {
        let choice = json["choices"]
            .get(0)
            .ok_or_else(|| LlmError::InvalidResponse("no choices returned".to_string()))?;
        let message = &choice["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();
        let finish_reason = choice["finish_reason"].as_str().unwrap_or_default();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                let name = function["name"].as_str().unwrap_or_default();
                let arguments = match &function["arguments"] {
                    Value::String(raw) => serde_json::from_str::<Map<String, Value>>(raw).ok(),
                    Value::Object(obj) => Some(obj.clone()),
                    _ => None,
                };

                let Some(arguments) = arguments else {
                    warn!("Dropping tool call '{}' with unparseable arguments", name);
                    continue;
                };

                tool_calls.push(ToolCall::new(
                    call["id"].as_str().unwrap_or_default(),
                    name,
                    arguments,
                ));
            }
        }

        Ok(Message {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_results: Vec::new(),
            end: TERMINAL_FINISH_REASONS.contains(&finish_reason),
        })
    }

    async fn send(&self, body: &Value) -> Result<Value> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }

        let text = response.text().await?;
        if !status.is_success() {
            let error = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), text.trim()));
            return Err(LlmError::Api(error));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn call(&self, cancel: &CancellationToken, messages: &[Message]) -> Result<Message> {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        trace!("Calling {} with {} messages", self.api_base, messages.len());

        let body = self.build_request(messages);
        let json = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            json = self.send(&body) => json?,
        };

        let message = self.parse_response(json)?;
        debug!(
            tool_calls = message.tool_calls.len(),
            end = message.end,
            "Model responded"
        );
        Ok(message)
    }
}
