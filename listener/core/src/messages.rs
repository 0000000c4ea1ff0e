//! Conversation Messages
//!
//! Types shared by both ends of the chat stream: the wire shape the client
//! posts to the gateway, the richer entries the client keeps in its
//! conversation store, and the identifiers and completion metadata that flow
//! through the stream.
//!
//! # Design Philosophy
//!
//! The wire type ([`ChatMessage`]) carries only what the provider needs: a
//! role and the text. Everything the UI needs on top of that (ids, creation
//! time, streaming status, whether the entry is a client-side fallback) lives
//! on [`Message`] and never leaves the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// AI listener reply
    Assistant,
    /// Persona instruction, synthesized by the gateway only
    System,
}

impl MessageRole {
    /// Lowercase wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message as it travels between client, gateway and provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message with an explicit role
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Body of `POST /api/chat`
///
/// Messages are ordered oldest to newest. Extra fields sent by browser chat
/// helpers (ids, data attachments) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Full conversation history, including the newest user message
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Create a request from a message list
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }
}

/// Message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        Self(format!("msg-{}", Uuid::new_v4()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new unique session ID
    pub fn new() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of a stored message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Fully received (or authored locally)
    #[default]
    Complete,
    /// Assistant text still arriving
    Streaming,
    /// Stream failed after partial text was shown
    Interrupted,
    /// User cancelled the turn after partial text was shown
    Cancelled,
}

/// An entry in the client-side conversation store
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Streaming status
    pub status: MessageStatus,
    /// Client-synthesized failure notice, never sent as history
    #[serde(default)]
    pub fallback: bool,
}

impl Message {
    /// Create a complete message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            status: MessageStatus::Complete,
            fallback: false,
        }
    }

    /// Create an empty assistant entry whose content will grow
    #[must_use]
    pub fn streaming_assistant() -> Self {
        Self {
            status: MessageStatus::Streaming,
            ..Self::new(MessageRole::Assistant, String::new())
        }
    }

    /// Create the fixed-text assistant notice shown when a turn fails
    pub fn fallback(content: impl Into<String>) -> Self {
        Self {
            fallback: true,
            ..Self::new(MessageRole::Assistant, content)
        }
    }

    /// Whether this entry belongs in the history sent to the gateway
    #[must_use]
    pub fn is_context(&self) -> bool {
        !self.fallback && self.role != MessageRole::System && !self.content.is_empty()
    }

    /// Wire form of this entry
    #[must_use]
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.clone())
    }
}

/// Why the provider stopped generating
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// Natural end of the reply
    #[default]
    Stop,
    /// Token limit reached
    Length,
    /// Provider safety filter stopped the reply
    ContentFilter,
    /// Provider reported an error
    Error,
    /// Anything else the provider reported
    Other,
}

/// Token accounting reported by the provider (zero when unknown)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens in the prompt, including the system message
    pub prompt_tokens: u32,
    /// Tokens generated for the reply
    pub completion_tokens: u32,
}
