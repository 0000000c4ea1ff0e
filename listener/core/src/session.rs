//! Session Management
//!
//! The per-session context of the chat surface: the conversation store, the
//! input buffer, the turn phase and the mood log.
//!
//! # Design Philosophy
//!
//! Everything lives on one [`ChatSession`] value owned by the surface. There
//! are no globals; dropping the session discards the conversation. Only the
//! stream assembler and the client driver mutate it during a turn, and at
//! most one turn runs at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::{ChatMessage, Message, MessageRole, MessageStatus, SessionId};
use crate::security::DEFAULT_MAX_INPUT_CHARS;

/// Fixed assistant text appended when a turn fails
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't respond just now. Please try again.";

/// Where the session is in the current turn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    /// Waiting for input
    #[default]
    Idle,
    /// Request issued, no reply text yet (typing indicator)
    Sending,
    /// Reply text arriving
    Receiving,
    /// Turn failed; the fallback is being appended
    Errored,
}

/// Why an input could not be submitted
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// Nothing but whitespace
    #[error("Message is empty")]
    Empty,

    /// Longer than the input cap
    #[error("Message is {len} characters (max: {max})")]
    TooLong {
        /// Characters submitted
        len: usize,
        /// Configured cap
        max: usize,
    },

    /// A turn is already in flight
    #[error("A reply is still in progress")]
    Busy,
}

/// A mood the user picked, kept only for this session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodSample {
    /// Mood label as shown in the selector
    pub label: String,
    /// When it was picked
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of mood samples
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MoodLog {
    samples: Vec<MoodSample>,
}

impl MoodLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mood at the current time
    pub fn record(&mut self, label: impl Into<String>) -> &MoodSample {
        self.samples.push(MoodSample {
            label: label.into(),
            timestamp: Utc::now(),
        });
        &self.samples[self.samples.len() - 1]
    }

    /// All samples, oldest first
    #[must_use]
    pub fn samples(&self) -> &[MoodSample] {
        &self.samples
    }

    /// Most recent sample
    #[must_use]
    pub fn latest(&self) -> Option<&MoodSample> {
        self.samples.last()
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no mood was recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-session chat context
#[derive(Clone, Debug)]
pub struct ChatSession {
    id: SessionId,
    messages: Vec<Message>,
    input: String,
    phase: TurnPhase,
    moods: MoodLog,
    max_input_chars: usize,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// Create an empty session with the default input cap
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_input_chars(DEFAULT_MAX_INPUT_CHARS)
    }

    /// Create an empty session with a custom input cap
    #[must_use]
    pub fn with_max_input_chars(max_input_chars: usize) -> Self {
        Self {
            id: SessionId::new(),
            messages: Vec::new(),
            input: String::new(),
            phase: TurnPhase::Idle,
            moods: MoodLog::new(),
            max_input_chars,
        }
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Replace the input buffer
    ///
    /// The buffer is capped like the UI's text field: anything past the
    /// character cap is dropped.
    pub fn set_input(&mut self, text: &str) {
        self.input = text.chars().take(self.max_input_chars).collect();
    }

    /// Current input buffer
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Input character cap
    #[must_use]
    pub fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }

    /// Submit the input buffer
    ///
    /// On success the buffer is cleared, the user message is appended, the
    /// phase becomes `Sending` and the history for the request is returned.
    pub fn submit(&mut self) -> Result<Vec<ChatMessage>, SubmitError> {
        let text = self.input.clone();
        let history = self.submit_text(&text)?;
        self.input.clear();
        Ok(history)
    }

    /// Submit text directly, bypassing the input buffer
    pub fn submit_text(&mut self, text: &str) -> Result<Vec<ChatMessage>, SubmitError> {
        if self.phase != TurnPhase::Idle {
            return Err(SubmitError::Busy);
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitError::Empty);
        }

        let len = text.chars().count();
        if len > self.max_input_chars {
            return Err(SubmitError::TooLong {
                len,
                max: self.max_input_chars,
            });
        }

        self.messages.push(Message::new(MessageRole::User, text));
        self.phase = TurnPhase::Sending;
        tracing::debug!(session = %self.id.0, chars = len, "User message submitted");

        Ok(self.history())
    }

    /// Whether the input field accepts submissions
    #[must_use]
    pub fn is_input_enabled(&self) -> bool {
        self.phase == TurnPhase::Idle
    }

    /// Current turn phase
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// All messages in display order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Message history to send to the gateway
    ///
    /// Every message except fallback notices and empty entries, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.is_context())
            .map(Message::to_chat_message)
            .collect()
    }

    /// Record a mood pick
    pub fn record_mood(&mut self, label: impl Into<String>) -> &MoodSample {
        self.moods.record(label)
    }

    /// Mood log for this session
    #[must_use]
    pub fn moods(&self) -> &MoodLog {
        &self.moods
    }

    // ---- Turn mutations used by the stream assembler ----

    /// Append an empty streaming assistant entry and enter `Receiving`
    pub(crate) fn start_reply(&mut self) -> usize {
        self.messages.push(Message::streaming_assistant());
        self.phase = TurnPhase::Receiving;
        self.messages.len() - 1
    }

    /// Replace the reply text with the cumulative content
    pub(crate) fn set_reply_content(&mut self, index: usize, content: &str) -> Option<&Message> {
        let message = self.messages.get_mut(index)?;
        message.content.clear();
        message.content.push_str(content);
        Some(message)
    }

    /// Set the final status of a reply entry
    pub(crate) fn settle_reply(&mut self, index: usize, status: MessageStatus) {
        if let Some(message) = self.messages.get_mut(index) {
            message.status = status;
        }
    }

    /// End a failed turn: `Errored`, one fallback notice, back to `Idle`
    pub(crate) fn fail_turn(&mut self) -> &Message {
        self.phase = TurnPhase::Errored;
        self.messages.push(Message::fallback(FALLBACK_REPLY));
        self.phase = TurnPhase::Idle;
        &self.messages[self.messages.len() - 1]
    }

    /// End the turn normally or after cancellation
    pub(crate) fn end_turn(&mut self) {
        self.phase = TurnPhase::Idle;
    }
}
