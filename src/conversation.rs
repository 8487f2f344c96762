//! Caller-owned, append-only chat log for one interactive session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking for infrastructure.
    User,
    /// The generator.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

/// One entry in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Message body.
    pub content: String,
}

/// Messages in the order they were appended. Entries can't be edited or removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message {
            role,
            content: content.into(),
        });
    }

    /// All messages so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True before the first message.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Assistant message recorded for a generated configuration.
pub fn generated_message(configuration: &str) -> String {
    format!("Generated Terraform Configuration:\n```hcl\n{configuration}\n```")
}
