//! Conversation history and research topic extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic used when the conversation carries nothing to research.
pub const DEFAULT_TOPIC: &str = "General research topic";

/// Who said a line of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used in research transcripts.
    pub fn speaker(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.speaker().to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            sent_at: Some(Utc::now()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn transcript_line(&self) -> String {
        format!("{}: {}", self.role.speaker(), self.content.trim())
    }
}

/// Ordered conversation history for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation holding a single user message.
    pub fn from_user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
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

    /// Most recent user message, if any.
    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// The research subject this conversation asks about.
    ///
    /// A single message is used verbatim; longer histories become a
    /// `User:` / `Assistant:` transcript so follow-up questions keep their
    /// context.
    pub fn research_topic(&self) -> String {
        match self.messages.as_slice() {
            [] => DEFAULT_TOPIC.to_string(),
            [only] => {
                let trimmed = only.content.trim();
                if trimmed.is_empty() {
                    DEFAULT_TOPIC.to_string()
                } else {
                    trimmed.to_string()
                }
            }
            many => many
                .iter()
                .map(Message::transcript_line)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
