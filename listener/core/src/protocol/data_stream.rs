//! Data Stream Parts
//!
//! Encoding on the gateway side and incremental decoding on the client side.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use super::{LineBuffer, ProtocolError};
use crate::messages::{FinishReason, TokenUsage};

/// Response header announcing the framed format
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

/// Value of [`DATA_STREAM_HEADER`]
pub const DATA_STREAM_VERSION: &str = "v1";

/// Content type of a data stream response
pub const DATA_STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// One line of the data stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataStreamPart {
    /// Start of the assistant reply (`f`)
    StartStep {
        /// Identifier of the reply
        message_id: String,
    },
    /// Text increment (`0`)
    Text(String),
    /// Error; no finish part follows (`3`)
    Error(String),
    /// End of one generation step (`e`)
    FinishStep {
        /// Why generation stopped
        finish_reason: FinishReason,
        /// Token accounting
        usage: TokenUsage,
        /// Whether another step continues this reply
        is_continued: bool,
    },
    /// End of the whole reply (`d`)
    FinishMessage {
        /// Why generation stopped
        finish_reason: FinishReason,
        /// Token accounting
        usage: TokenUsage,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPayload {
    message_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishPayload {
    #[serde(default)]
    finish_reason: FinishReason,
    #[serde(default)]
    usage: TokenUsage,
    #[serde(default)]
    is_continued: bool,
}

impl DataStreamPart {
    /// Single-character part code
    #[must_use]
    pub fn code(&self) -> char {
        match self {
            Self::StartStep { .. } => 'f',
            Self::Text(_) => '0',
            Self::Error(_) => '3',
            Self::FinishStep { .. } => 'e',
            Self::FinishMessage { .. } => 'd',
        }
    }

    /// Whether this part ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::FinishMessage { .. })
    }

    /// Encode as one newline-terminated line
    #[must_use]
    pub fn encode(&self) -> String {
        let payload = match self {
            Self::StartStep { message_id } => json!({ "messageId": message_id }),
            Self::Text(text) | Self::Error(text) => json!(text),
            Self::FinishStep {
                finish_reason,
                usage,
                is_continued,
            } => json!({
                "finishReason": finish_reason,
                "usage": usage,
                "isContinued": is_continued,
            }),
            Self::FinishMessage {
                finish_reason,
                usage,
            } => json!({
                "finishReason": finish_reason,
                "usage": usage,
            }),
        };
        format!("{}:{}\n", self.code(), payload)
    }

    /// Encode into a body chunk
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.encode())
    }

    /// Parse one line (without its newline)
    ///
    /// Returns `Ok(None)` for blank lines and for part codes this client does
    /// not use (tool calls, annotations, reasoning), which are skipped.
    pub fn parse_line(line: &str) -> Result<Option<Self>, ProtocolError> {
        let line = line.trim_end();
        if line.is_empty() {
            return Ok(None);
        }

        let (code, payload) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedLine(truncate_for_error(line)))?;

        let mut chars = code.chars();
        let code = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(ProtocolError::MalformedLine(truncate_for_error(line))),
        };

        let invalid = |e: serde_json::Error| ProtocolError::InvalidPayload {
            code,
            message: e.to_string(),
        };

        let part = match code {
            'f' => {
                let start: StartPayload = serde_json::from_str(payload).map_err(invalid)?;
                Self::StartStep {
                    message_id: start.message_id,
                }
            }
            '0' => Self::Text(serde_json::from_str(payload).map_err(invalid)?),
            '3' => Self::Error(serde_json::from_str(payload).map_err(invalid)?),
            'e' => {
                let finish: FinishPayload = serde_json::from_str(payload).map_err(invalid)?;
                Self::FinishStep {
                    finish_reason: finish.finish_reason,
                    usage: finish.usage,
                    is_continued: finish.is_continued,
                }
            }
            'd' => {
                let finish: FinishPayload = serde_json::from_str(payload).map_err(invalid)?;
                Self::FinishMessage {
                    finish_reason: finish.finish_reason,
                    usage: finish.usage,
                }
            }
            other => {
                tracing::trace!(code = %other, "Skipping unused data stream part");
                return Ok(None);
            }
        };

        Ok(Some(part))
    }
}

fn truncate_for_error(line: &str) -> String {
    line.chars().take(64).collect()
}

/// Incremental decoder for a data stream body
///
/// Feed it body chunks in arrival order with [`push`](Self::push) and drain
/// parts with [`next_part`](Self::next_part).
#[derive(Debug, Default)]
pub struct DataStreamDecoder {
    lines: LineBuffer,
}

impl DataStreamDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a body chunk
    pub fn push(&mut self, data: &[u8]) {
        self.lines.push(data);
    }

    /// Try to decode the next part
    ///
    /// Returns:
    /// - `Ok(Some(part))` if a complete part was decoded
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if a line is malformed
    pub fn next_part(&mut self) -> Result<Option<DataStreamPart>, ProtocolError> {
        while let Some(line) = self.lines.next_line()? {
            if let Some(part) = DataStreamPart::parse_line(&line)? {
                return Ok(Some(part));
            }
        }
        Ok(None)
    }

    /// Decode a final part that arrived without a trailing newline
    pub fn finish(&mut self) -> Result<Option<DataStreamPart>, ProtocolError> {
        match self.lines.take_remaining()? {
            Some(line) => DataStreamPart::parse_line(&line),
            None => Ok(None),
        }
    }
}
