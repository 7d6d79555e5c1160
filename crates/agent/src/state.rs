//! Per-run state: the conversation and the tool usage counters

use std::collections::BTreeMap;

use analyzer_llm::{Message, Role};
use serde::Serialize;

/// Tool name to invocation count for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Usage {
    counts: BTreeMap<String, u32>,
}

impl Usage {
    /// Zeroed counters for every given tool
    pub fn for_tools<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            counts: names.into_iter().map(|n| (n.into(), 0)).collect(),
        }
    }

    pub fn increment(&mut self, name: &str) {
        if let Some(count) = self.counts.get_mut(name) {
            *count += 1;
        }
    }

    pub fn get(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn as_map(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    /// True when every limited tool has reached its ceiling.
    ///
    /// Never true when `limits` is empty: unlimited tools cannot exhaust.
    pub fn all_exhausted(&self, limits: &BTreeMap<String, u32>) -> bool {
        !limits.is_empty()
            && limits
                .iter()
                .all(|(name, limit)| self.get(name) >= *limit)
    }
}

/// Ordered message history of one run.
///
/// Message 0 is always the system prompt; it is the only entry that is ever
/// replaced.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(user)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn replace_system(&mut self, prompt: impl Into<String>) {
        self.messages[0] = Message::system(prompt);
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
