//! Command implementations

use std::time::Duration;

use anyhow::{bail, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use analyzer_agent::{parse_args, Agent, FnTool, StopReason, ToolError};
use analyzer_config::{self, Config, LlmSettings};
use analyzer_llm::{LlmConfig, LlmKind};

const CALC_BEHAVIOR: &str = "You are a calculator. Add num1 and num2 from the user input by \
calling the add tool, then answer with the sum.";

/// Output of the calculator agent
#[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CalcResult {
    pub sum: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CalcInput {
    num1: i64,
    num2: i64,
}

/// Initialize config
pub async fn init_command() -> Result<()> {
    println!("Initializing Reddit Analyzer...");

    analyzer_config::init().await?;

    println!("Config: {}", analyzer_config::config_path().display());
    println!("\nNext steps:");
    println!("  1. Set llm.api_key in the config file or export OPENAI_API_KEY");
    println!("  2. Try it: analyzer calc --num1 3 --num2 5");

    Ok(())
}

/// Show configuration status
pub async fn status_command() -> Result<()> {
    let config_path = analyzer_config::config_path();

    println!("Reddit Analyzer Status");
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    println!("Provider:  {}", config.llm.provider);
    println!("Model:     {}", config.llm.model);
    println!(
        "API base:  {}",
        config.llm.api_base.as_deref().unwrap_or("[default]")
    );
    println!(
        "API key:   {}",
        if config.llm.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    if config.agent.tool_limits.is_empty() {
        println!("Limits:    [none]");
    } else {
        for (tool, limit) in &config.agent.tool_limits {
            println!("Limit:     {} = {}", tool, limit);
        }
    }

    Ok(())
}

/// Add two numbers with the calculator agent
pub async fn calc_command(num1: i64, num2: i64, limit: Option<u32>, timeout: u64) -> Result<()> {
    let config = Config::load().await?;
    if !config.llm.has_api_key() {
        bail!(
            "No API key configured. Set llm.api_key in {} or export {}",
            analyzer_config::config_path().display(),
            analyzer_config::ENV_API_KEY
        );
    }

    let llm = llm_config(&config.llm)?;
    let limit = limit
        .or_else(|| config.agent.tool_limits.get("add").copied())
        .unwrap_or(1);

    let agent = Agent::<CalcResult>::builder("calculator")
        .behavior(CALC_BEHAVIOR)
        .llm_config(llm)
        .tool(add_tool())
        .tool_limit("add", limit)
        .build()
        .context("Failed to build calculator agent")?;

    info!(num1, num2, limit, "Running calculator agent");
    let result = match agent
        .run_with_timeout(&CalcInput { num1, num2 }, Duration::from_secs(timeout))
        .await
    {
        Ok(result) => result,
        Err(e) => {
            debug!(messages = e.messages.len(), "Transcript at failure: {:?}", e.messages);
            return Err(e.into());
        }
    };

    if result.stop == StopReason::LimitReached {
        info!("Add tool limit reached");
    }
    debug!(usage = ?result.usage, "Calculator finished");

    println!("{}", serde_json::to_string_pretty(&result.data)?);
    Ok(())
}

/// Map file settings onto the backend configuration
pub fn llm_config(settings: &LlmSettings) -> Result<LlmConfig> {
    let kind: LlmKind = settings
        .provider
        .parse()
        .with_context(|| format!("Unknown provider '{}'", settings.provider))?;

    Ok(LlmConfig {
        kind,
        api_key: settings.api_key.clone(),
        api_base: settings.api_base.clone(),
        model: settings.model.clone(),
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        timeout: settings.timeout(),
    })
}

pub fn add_tool() -> FnTool {
    FnTool::new(
        "add",
        "Add two integers and return their sum",
        json!({
            "type": "object",
            "properties": {
                "num1": {"type": "integer", "description": "first addend"},
                "num2": {"type": "integer", "description": "second addend"}
            },
            "required": ["num1", "num2"]
        }),
        |_, args| {
            let input: CalcInput = parse_args(args)?;
            let sum = input
                .num1
                .checked_add(input.num2)
                .ok_or_else(|| ToolError::failed("sum overflows a 64-bit integer"))?;
            Ok(CalcResult { sum })
        },
    )
}
