//! Tests for Config serialization, file round-trips and defaults

use analyzer_config::{AgentSettings, Config, LlmSettings};
use tempfile::TempDir;

/// Helper to create a temporary directory for tests
fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Test that default Config has expected values
#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.llm.provider, "openai");
    assert!(config.llm.api_key.is_empty());
    assert!(config.llm.api_base.is_none());
    assert_eq!(config.llm.model, "gpt-4");
    assert_eq!(config.llm.max_tokens, 4096);
    assert_eq!(config.llm.temperature, 0.7);
    assert_eq!(config.llm.timeout_secs, 30);

    assert!(config.agent.tool_limits.is_empty());
}

/// Test that an empty JSON object deserializes to defaults
#[test]
fn test_empty_json_uses_defaults() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config.llm.model, "gpt-4");
    assert_eq!(config.llm.timeout_secs, 30);
}

/// Test partial llm section keeps remaining defaults
#[test]
fn test_partial_llm_section() {
    let config: Config =
        serde_json::from_str(r#"{"llm": {"model": "gpt-4.1", "temperature": 0.0}}"#).unwrap();

    assert_eq!(config.llm.model, "gpt-4.1");
    assert_eq!(config.llm.temperature, 0.0);
    assert_eq!(config.llm.max_tokens, 4096);
    assert_eq!(config.llm.provider, "openai");
}

/// Test tool limits deserialize into an ordered map
#[test]
fn test_agent_tool_limits() {
    let config: Config =
        serde_json::from_str(r#"{"agent": {"tool_limits": {"search": 3, "add": 1}}}"#).unwrap();

    let names: Vec<&String> = config.agent.tool_limits.keys().collect();
    assert_eq!(names, vec!["add", "search"]);
    assert_eq!(config.agent.tool_limits["add"], 1);
}

/// Test api_base is omitted from serialized output when unset
#[test]
fn test_api_base_skipped_when_none() {
    let json = serde_json::to_string(&LlmSettings::default()).unwrap();
    assert!(!json.contains("api_base"));
}

/// Test save and load round-trip through a file
#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.llm.api_key = "sk-file".to_string();
    config.llm.model = "gpt-4.1".to_string();
    config.agent = AgentSettings::default();
    config.agent.tool_limits.insert("add".to_string(), 2);

    config.save_to(&path).await.expect("Failed to save");
    assert!(path.exists());

    let loaded = Config::load_from(&path).await.expect("Failed to load");
    assert_eq!(loaded.llm.api_key, "sk-file");
    assert_eq!(loaded.llm.model, "gpt-4.1");
    assert_eq!(loaded.agent.tool_limits["add"], 2);
}

/// Test load from a missing file returns defaults
#[tokio::test]
async fn test_load_missing_file_returns_defaults() {
    let dir = temp_dir();
    let path = dir.path().join("does-not-exist.json");

    let loaded = Config::load_from(&path).await.expect("Failed to load");
    assert_eq!(loaded.llm.model, "gpt-4");
}

/// Test load from a malformed file fails with a Json error
#[tokio::test]
async fn test_load_malformed_file() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let result = Config::load_from(&path).await;
    assert!(matches!(result, Err(analyzer_config::ConfigError::Json(_))));
}

/// Test environment overlay on top of a file config
#[tokio::test]
async fn test_env_overlay_after_file() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    let mut config = Config::default();
    config.llm.model = "from-file".to_string();
    config.save_to(&path).await.unwrap();

    let mut loaded = Config::load_from(&path).await.unwrap();
    loaded
        .apply_env_from(|name| (name == "OPENAI_MODEL").then(|| "from-env".to_string()))
        .unwrap();

    assert_eq!(loaded.llm.model, "from-env");
}
