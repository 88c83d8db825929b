//! Chat message types shared by every vendor adapter.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing instructions.
    System,
    /// User message.
    User,
    /// Assistant (model) message.
    Assistant,
}

impl Role {
    /// Get the string representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent the message.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl Message {
    /// Create a message with the given role.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// System instructions for a completion.
///
/// A plain string becomes one leading system message; a list of messages is
/// prepended verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemMessage {
    /// One system message.
    Text(String),
    /// Pre-formed messages, prepended as-is.
    Messages(Vec<Message>),
}

impl From<&str> for SystemMessage {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for SystemMessage {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Message>> for SystemMessage {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

/// Build the ordered message list for a completion call:
/// system message(s), then history, then the new user prompt.
#[must_use]
pub fn build_messages(
    prompt: &str,
    history: &[Message],
    system_message: Option<&SystemMessage>,
) -> Vec<Message> {
    let system_len = match system_message {
        Some(SystemMessage::Text(_)) => 1,
        Some(SystemMessage::Messages(msgs)) => msgs.len(),
        None => 0,
    };
    let mut messages = Vec::with_capacity(system_len + history.len() + 1);

    match system_message {
        Some(SystemMessage::Text(text)) => messages.push(Message::system(text.as_str())),
        Some(SystemMessage::Messages(msgs)) => messages.extend_from_slice(msgs),
        None => {}
    }
    messages.extend_from_slice(history);
    messages.push(Message::user(prompt));

    messages
}
