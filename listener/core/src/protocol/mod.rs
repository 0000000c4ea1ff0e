//! Chat Stream Wire Protocol
//!
//! The gateway answers `POST /api/chat` with a line-framed data stream: one
//! part per line, `<code>:<json>\n`. Text increments, errors and completion
//! markers are distinct parts, so the client can tell a finished reply from a
//! connection that simply went away.
//!
//! # Part Codes
//!
//! ```text
//! f:{"messageId":"msg-..."}                      start of the reply
//! 0:"That sounds"                                text increment
//! 3:"provider connection lost"                   error, stream ends after it
//! e:{"finishReason":"stop","usage":{..},...}     end of the generation step
//! d:{"finishReason":"stop","usage":{..}}         end of the reply
//! ```
//!
//! Both ends decode from raw bytes through [`LineBuffer`], so multi-byte
//! characters split across network chunks are reassembled before parsing.

mod data_stream;
mod lines;

pub use data_stream::{
    DataStreamDecoder, DataStreamPart, DATA_STREAM_CONTENT_TYPE, DATA_STREAM_HEADER,
    DATA_STREAM_VERSION,
};
pub use lines::{LineBuffer, MAX_LINE_SIZE};

use thiserror::Error;

/// Errors raised while decoding a stream
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A line did not have the `<code>:<payload>` shape
    #[error("Malformed stream line: {0}")]
    MalformedLine(String),

    /// A known part carried a payload that is not valid JSON for it
    #[error("Invalid payload for part '{code}': {message}")]
    InvalidPayload {
        /// Part code
        code: char,
        /// Parser message
        message: String,
    },

    /// A line was not valid UTF-8
    #[error("Stream line is not valid UTF-8")]
    InvalidUtf8,

    /// A single line exceeded [`MAX_LINE_SIZE`]
    #[error("Stream line exceeds {MAX_LINE_SIZE} bytes")]
    LineTooLong,
}
