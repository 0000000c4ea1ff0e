//! Newline Framing
//!
//! Byte buffer that yields complete lines. Used for the gateway data stream
//! on the client and for provider server-sent events on the gateway.

use super::ProtocolError;

/// Maximum size of a single line (10 MB)
///
/// Prevents memory exhaustion from a peer that never sends a newline.
pub const MAX_LINE_SIZE: usize = 10 * 1024 * 1024;

/// Minimum buffer capacity
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Buffers incoming bytes and yields complete lines
///
/// Lines are split on `\n`; a trailing `\r` is stripped. UTF-8 is validated
/// per line, never per chunk.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    /// Bytes after `read_pos` already searched for a newline
    scanned: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            scanned: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Take the next complete line
    ///
    /// Returns `Ok(None)` when no full line is buffered yet.
    pub fn next_line(&mut self) -> Result<Option<String>, ProtocolError> {
        let pending = &self.buffer[self.read_pos..];
        let Some(offset) = pending[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = pending.len();
            if pending.len() > MAX_LINE_SIZE {
                return Err(ProtocolError::LineTooLong);
            }
            return Ok(None);
        };

        let newline = self.scanned + offset;
        let line = decode_line(&pending[..newline])?;
        self.read_pos += newline + 1;
        self.scanned = 0;
        Ok(Some(line))
    }

    /// Take whatever is left after the peer closed the stream
    ///
    /// Returns `Ok(None)` if nothing but whitespace remains.
    pub fn take_remaining(&mut self) -> Result<Option<String>, ProtocolError> {
        let rest = decode_line(&self.buffer[self.read_pos..])?;
        self.clear();
        if rest.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(rest))
        }
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
        self.scanned = 0;
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, ProtocolError> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}
