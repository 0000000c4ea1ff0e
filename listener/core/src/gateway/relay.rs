//! Provider-to-client relay
//!
//! Turns the provider token channel into data stream parts. The first
//! provider event is awaited before the response is committed, so failures
//! that happen before any text become plain error responses instead of
//! half-open streams.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};

use super::error::ApiError;
use crate::backend::{ChatBackend, CompletionRequest, ProviderError, StreamingToken};
use crate::messages::{FinishReason, TokenUsage};
use crate::protocol::DataStreamPart;

/// An open reply whose first provider event has already arrived
pub(crate) struct Relay {
    rx: mpsc::Receiver<StreamingToken>,
    pending: VecDeque<DataStreamPart>,
    idle_timeout: Duration,
    finished: bool,
    message_id: String,
    chunks: usize,
}

impl Relay {
    /// Call the provider and wait for its first event
    ///
    /// Both the call and the first event must arrive within
    /// `first_token_timeout`.
    pub(crate) async fn open(
        backend: &dyn ChatBackend,
        request: &CompletionRequest,
        message_id: String,
        first_token_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let deadline = Instant::now() + first_token_timeout;
        let timed_out = || {
            ApiError::gateway_timeout(format!(
                "{} did not respond within {}s",
                backend.name(),
                first_token_timeout.as_secs()
            ))
        };

        let mut rx = timeout_at(deadline, backend.send_streaming(request))
            .await
            .map_err(|_| timed_out())??;

        let first = timeout_at(deadline, rx.recv())
            .await
            .map_err(|_| timed_out())?;

        let mut relay = Self {
            rx,
            pending: VecDeque::new(),
            idle_timeout,
            finished: false,
            message_id: message_id.clone(),
            chunks: 0,
        };
        relay
            .pending
            .push_back(DataStreamPart::StartStep { message_id });

        match first {
            Some(StreamingToken::Token(text)) => {
                relay.chunks += 1;
                relay.pending.push_back(DataStreamPart::Text(text));
            }
            Some(StreamingToken::Complete {
                finish_reason,
                usage,
            }) => {
                tracing::debug!(request_id = %relay.message_id, "Provider finished without text");
                relay.finish(finish_reason, usage);
            }
            Some(StreamingToken::Error(e)) => return Err(e.into()),
            None => {
                return Err(ProviderError::Stream(
                    "provider closed the stream before replying".to_string(),
                )
                .into())
            }
        }

        Ok(relay)
    }

    fn finish(&mut self, finish_reason: FinishReason, usage: TokenUsage) {
        self.finished = true;
        self.pending.push_back(DataStreamPart::FinishStep {
            finish_reason,
            usage,
            is_continued: false,
        });
        self.pending.push_back(DataStreamPart::FinishMessage {
            finish_reason,
            usage,
        });
    }

    fn abort(&mut self, message: String) -> DataStreamPart {
        self.finished = true;
        tracing::warn!(
            request_id = %self.message_id,
            chunks = self.chunks,
            error = %message,
            "Reply stream ended abnormally"
        );
        DataStreamPart::Error(message)
    }

    /// Next part to write, `None` once the body is complete
    pub(crate) async fn next_part(&mut self) -> Option<DataStreamPart> {
        if let Some(part) = self.pending.pop_front() {
            return Some(part);
        }
        if self.finished {
            return None;
        }

        match timeout(self.idle_timeout, self.rx.recv()).await {
            Ok(Some(StreamingToken::Token(text))) => {
                self.chunks += 1;
                Some(DataStreamPart::Text(text))
            }
            Ok(Some(StreamingToken::Complete {
                finish_reason,
                usage,
            })) => {
                tracing::info!(
                    request_id = %self.message_id,
                    chunks = self.chunks,
                    completion_tokens = usage.completion_tokens,
                    "Reply complete"
                );
                self.finish(finish_reason, usage);
                self.pending.pop_front()
            }
            Ok(Some(StreamingToken::Error(e))) => Some(self.abort(e.to_string())),
            Ok(None) => Some(self.abort("provider stream closed unexpectedly".to_string())),
            Err(_) => Some(self.abort(format!(
                "provider sent nothing for {}s",
                self.idle_timeout.as_secs()
            ))),
        }
    }

    /// Response body stream; dropping it drops the provider channel
    pub(crate) fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
        futures::stream::unfold(self, |mut relay| async move {
            relay
                .next_part()
                .await
                .map(|part| (Ok(part.to_bytes()), relay))
        })
    }
}
