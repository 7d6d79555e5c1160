//! Tests for tool registry

use analyzer_agent::tools::{to_tool_def, FnTool, Tool, ToolRegistry};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

fn constant(name: &str, value: Value) -> FnTool {
    FnTool::new(name, format!("Returns {value}"), json!({"type": "object"}), move |_, _| {
        Ok(value.clone())
    })
}

struct Upper;

#[async_trait]
impl Tool for Upper {
    fn name(&self) -> &str {
        "upper"
    }

    fn description(&self) -> &str {
        "Uppercases the text argument"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })
    }

    async fn call(
        &self,
        _cancel: &CancellationToken,
        _id: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, analyzer_agent::ToolError> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| analyzer_agent::ToolError::invalid_arguments("text is required"))?;
        Ok(json!(text.to_uppercase()))
    }
}

#[test]
fn test_registry_new() {
    let registry = ToolRegistry::new();
    assert!(registry.names().is_empty());
    assert!(registry.is_empty());
}

#[test]
fn test_registry_default() {
    let registry: ToolRegistry = Default::default();
    assert_eq!(registry.len(), 0);
}

#[test]
fn test_registry_names_are_sorted() {
    let mut registry = ToolRegistry::new();
    registry.register(constant("zeta", json!(1)));
    registry.register(Upper);
    registry.register(constant("alpha", json!(2)));

    assert_eq!(registry.names(), vec!["alpha", "upper", "zeta"]);
}

#[test]
fn test_registry_replaces_same_name() {
    let mut registry = ToolRegistry::new();
    registry.register(constant("pick", json!(1)));
    registry.register(constant("pick", json!(2)));

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("pick").unwrap().description(), "Returns 2");
}

#[test]
fn test_registry_get_missing() {
    let registry = ToolRegistry::new();
    assert!(registry.get("nonexistent").is_none());
    assert!(!registry.has("nonexistent"));
}

#[test]
fn test_definitions_and_describe() {
    let mut registry = ToolRegistry::new();
    registry.register(Upper);

    let defs = registry.definitions();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].name, "upper");
    assert_eq!(defs[0].parameters["required"], json!(["text"]));

    let described = registry.describe();
    assert_eq!(described["upper"], to_tool_def(&Upper));
    assert_eq!(
        serde_json::to_value(&described).unwrap()["upper"]["description"],
        json!("Uppercases the text argument")
    );
}

#[tokio::test]
async fn test_call_through_registry() {
    let mut registry = ToolRegistry::new();
    registry.register(Upper);

    let tool = registry.get("upper").unwrap();
    let args = json!({"text": "abc"}).as_object().cloned().unwrap();
    let out = tool.call(&CancellationToken::new(), "c1", &args).await.unwrap();
    assert_eq!(out, json!("ABC"));

    let err = tool
        .call(&CancellationToken::new(), "c2", &Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "invalid arguments: text is required");
}
