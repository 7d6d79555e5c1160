//! System prompt templates
//!
//! Placeholders are written `{{name}}` (or Go-style `{{.name}}`). Rendering
//! never silently drops a placeholder: an unknown name or a stray `{{` is an
//! error.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

pub const VAR_TOOLS: &str = "tools";
pub const VAR_TOOLS_USAGE: &str = "tools_usage";
pub const VAR_CALLING_LIMITS: &str = "calling_limits";
pub const VAR_OUTPUT_SCHEMA: &str = "output_schema";
pub const VAR_BEHAVIOR: &str = "behavior";

/// Template used when the builder is not given one
pub const DEFAULT_TEMPLATE: &str = r#"You are an agent that acts as described inside <BEHAVIOR></BEHAVIOR>.
When you are ready to finish, reply with a single JSON object that matches the output schema and nothing else.

TOOLS AVAILABLE TO USE:
{{.tools}}

CURRENT TOOLS USAGE:
{{.tools_usage}}

TOOLS USAGE LIMITS:
{{.calling_limits}}

OUTPUT SCHEMA:
{{.output_schema}}

<BEHAVIOR>
{{.behavior}}
</BEHAVIOR>
"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("template variable '{0}' is not defined")]
    MissingVariable(String),

    #[error("malformed placeholder at byte {offset}")]
    Malformed { offset: usize },

    #[error("rendered prompt is empty")]
    Empty,

    #[error("template variable cannot be serialized: {0}")]
    Serialize(String),
}

/// A textual template rendered against named variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn is_blank(&self) -> bool {
        self.template.trim().is_empty()
    }

    /// Names referenced by well-formed placeholders, in order of appearance
    pub fn variables(&self) -> Vec<&str> {
        PLACEHOLDER
            .captures_iter(&self.template)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    pub fn render(&self, vars: &BTreeMap<&str, String>) -> Result<String, PromptError> {
        let mut out = String::with_capacity(self.template.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_literal(&mut out, &self.template, last, whole.start())?;

            let value = vars
                .get(name.as_str())
                .ok_or_else(|| PromptError::MissingVariable(name.as_str().to_string()))?;
            out.push_str(value);
            last = whole.end();
        }
        push_literal(&mut out, &self.template, last, self.template.len())?;

        if out.trim().is_empty() {
            return Err(PromptError::Empty);
        }
        Ok(out)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl From<&str> for PromptTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for PromptTemplate {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}

// Literal text between placeholders must not open another one.
fn push_literal(out: &mut String, template: &str, start: usize, end: usize) -> Result<(), PromptError> {
    let literal = &template[start..end];
    if let Some(pos) = literal.find("{{") {
        return Err(PromptError::Malformed { offset: start + pos });
    }
    out.push_str(literal);
    Ok(())
}
