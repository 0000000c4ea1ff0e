//! Stream Assembler
//!
//! Applies one data stream body to a [`ChatSession`]. Created when the
//! request is issued and dropped when the stream terminates.

use thiserror::Error;

use crate::messages::{FinishReason, MessageId, MessageStatus, TokenUsage};
use crate::protocol::{DataStreamDecoder, DataStreamPart, ProtocolError};
use crate::session::ChatSession;

/// Why a turn ended in `Errored`
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnFailure {
    /// Request could not be sent or the connection broke
    #[error("Transport failed: {0}")]
    Transport(String),

    /// Gateway answered with a non-success status
    #[error("Gateway returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message from the body
        message: String,
    },

    /// Gateway reported an error part mid-stream
    #[error("Reply failed: {0}")]
    Gateway(String),

    /// Stream ended without a finish part
    #[error("Reply was interrupted")]
    Interrupted,

    /// No data within the read timeout
    #[error("Timed out waiting for the reply")]
    Timeout,

    /// Body could not be decoded
    #[error("Malformed reply stream: {0}")]
    Protocol(#[from] ProtocolError),

    /// Stream finished without any text
    #[error("Reply was empty")]
    EmptyReply,
}

/// Summary of a completed reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedReply {
    /// Store id of the assistant entry
    pub message_id: MessageId,
    /// Final text
    pub content: String,
    /// Why generation stopped
    pub finish_reason: FinishReason,
    /// Token accounting
    pub usage: TokenUsage,
}

/// Incremental decoder plus accumulator for one reply
#[derive(Debug, Default)]
pub struct StreamAssembler {
    decoder: DataStreamDecoder,
    accumulated: String,
    receiving: bool,
    entry: Option<usize>,
    chunks: usize,
    finish: Option<(FinishReason, TokenUsage)>,
}

impl StreamAssembler {
    /// Create an assembler for a newly issued request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the first text fragment has arrived
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Whether the finish part was seen
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }

    /// Text accumulated so far
    #[must_use]
    pub fn content(&self) -> &str {
        &self.accumulated
    }

    /// Number of text fragments applied
    #[must_use]
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Decode a body chunk and apply every complete part
    ///
    /// Returns `true` when the assistant entry changed and should be
    /// re-rendered.
    pub fn push_chunk(
        &mut self,
        session: &mut ChatSession,
        bytes: &[u8],
    ) -> Result<bool, TurnFailure> {
        self.decoder.push(bytes);
        let mut updated = false;
        while let Some(part) = self.decoder.next_part()? {
            updated |= self.apply(session, part)?;
        }
        Ok(updated)
    }

    fn apply(
        &mut self,
        session: &mut ChatSession,
        part: DataStreamPart,
    ) -> Result<bool, TurnFailure> {
        match part {
            DataStreamPart::Text(text) => {
                if text.is_empty() || self.finish.is_some() {
                    return Ok(false);
                }
                self.accumulated.push_str(&text);
                self.chunks += 1;

                let index = match self.entry {
                    Some(index) => index,
                    None => {
                        self.receiving = true;
                        let index = session.start_reply();
                        self.entry = Some(index);
                        index
                    }
                };
                session.set_reply_content(index, &self.accumulated);
                Ok(true)
            }
            DataStreamPart::Error(message) => Err(TurnFailure::Gateway(message)),
            DataStreamPart::FinishMessage {
                finish_reason,
                usage,
            } => {
                self.finish = Some((finish_reason, usage));
                Ok(false)
            }
            DataStreamPart::StartStep { .. } | DataStreamPart::FinishStep { .. } => Ok(false),
        }
    }

    /// The transport reached end of stream
    ///
    /// Succeeds only if a finish part arrived and some text was received.
    pub fn finish(&mut self, session: &mut ChatSession) -> Result<CompletedReply, TurnFailure> {
        if let Some(part) = self.decoder.finish()? {
            self.apply(session, part)?;
        }

        let Some((finish_reason, usage)) = self.finish else {
            return Err(TurnFailure::Interrupted);
        };
        let Some(index) = self.entry else {
            return Err(TurnFailure::EmptyReply);
        };

        session.settle_reply(index, MessageStatus::Complete);
        session.end_turn();

        let message_id = session
            .messages()
            .get(index)
            .map(|m| m.id.clone())
            .unwrap_or_default();

        Ok(CompletedReply {
            message_id,
            content: self.accumulated.clone(),
            finish_reason,
            usage,
        })
    }

    /// End the turn as failed
    ///
    /// Partial text stays visible, flagged interrupted, followed by exactly
    /// one fallback notice.
    pub fn fail(&mut self, session: &mut ChatSession, failure: &TurnFailure) {
        if let Some(index) = self.entry {
            session.settle_reply(index, MessageStatus::Interrupted);
        }
        tracing::warn!(
            session = %session.id().0,
            chunks = self.chunks,
            error = %failure,
            "Turn failed"
        );
        session.fail_turn();
    }

    /// End the turn at the user's request; no fallback is added
    pub fn cancel(&mut self, session: &mut ChatSession) {
        if let Some(index) = self.entry {
            session.settle_reply(index, MessageStatus::Cancelled);
        }
        tracing::debug!(session = %session.id().0, chunks = self.chunks, "Turn cancelled");
        session.end_turn();
    }
}
