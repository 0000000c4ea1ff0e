//! Server-Sent Events decoding for provider streams
//!
//! OpenAI, Groq and Gemini all stream as SSE. Only `data:` fields matter here;
//! `event:`, `id:`, `retry:` and comment lines are ignored.

use futures::StreamExt;
use tokio::sync::mpsc;

use super::traits::{ProviderError, StreamingToken, TOKEN_CHANNEL_CAPACITY};
use crate::protocol::{LineBuffer, ProtocolError};

/// Provider-specific interpretation of SSE payloads
pub(crate) trait StreamParser: Send + 'static {
    /// Turn one event payload into zero or more tokens
    ///
    /// Pushing a `Complete` or `Error` ends the relay.
    fn on_event(&mut self, data: &str, out: &mut Vec<StreamingToken>);

    /// Final token when the connection closed without a terminal token
    fn on_close(&mut self) -> StreamingToken;
}

/// Relay a streaming provider response into a token channel
///
/// The task stops as soon as the receiver is dropped, which drops the
/// response and closes the provider connection.
pub(crate) fn spawn_relay<P: StreamParser>(
    response: reqwest::Response,
    mut parser: P,
) -> mpsc::Receiver<StreamingToken> {
    let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        let mut sse = SseDecoder::new();
        let mut out = Vec::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => sse.push(&bytes),
                Err(e) => {
                    let _ = tx
                        .send(StreamingToken::Error(ProviderError::from_reqwest(&e)))
                        .await;
                    return;
                }
            }

            loop {
                match sse.next_event() {
                    Ok(Some(data)) => parser.on_event(&data, &mut out),
                    Ok(None) => break,
                    Err(e) => out.push(StreamingToken::Error(ProviderError::Stream(e.to_string()))),
                }
                if !forward(&tx, &mut out).await {
                    return;
                }
            }
        }

        match sse.finish() {
            Ok(Some(data)) => parser.on_event(&data, &mut out),
            Ok(None) => {}
            Err(e) => out.push(StreamingToken::Error(ProviderError::Stream(e.to_string()))),
        }
        if !forward(&tx, &mut out).await {
            return;
        }

        let _ = tx.send(parser.on_close()).await;
    });

    rx
}

/// Send buffered tokens; `false` once the relay should stop
async fn forward(tx: &mpsc::Sender<StreamingToken>, out: &mut Vec<StreamingToken>) -> bool {
    for token in out.drain(..) {
        let terminal = matches!(
            token,
            StreamingToken::Complete { .. } | StreamingToken::Error(_)
        );
        if tx.send(token).await.is_err() {
            // Receiver dropped, stop streaming
            return false;
        }
        if terminal {
            return false;
        }
    }
    true
}

/// Incremental SSE decoder yielding the data payload of each event
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
    data: Vec<String>,
}

impl SseDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a body chunk
    pub fn push(&mut self, chunk: &[u8]) {
        self.lines.push(chunk);
    }

    /// Next complete event payload, if one is buffered
    pub fn next_event(&mut self) -> Result<Option<String>, ProtocolError> {
        while let Some(line) = self.lines.next_line()? {
            if line.is_empty() {
                if let Some(event) = self.take_event() {
                    return Ok(Some(event));
                }
                continue;
            }
            self.accept_line(&line);
        }
        Ok(None)
    }

    /// Flush an event left unterminated when the connection closed
    pub fn finish(&mut self) -> Result<Option<String>, ProtocolError> {
        if let Some(rest) = self.lines.take_remaining()? {
            for line in rest.lines() {
                self.accept_line(line);
            }
        }
        Ok(self.take_event())
    }

    fn accept_line(&mut self, line: &str) {
        if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}
