//! Chat Client
//!
//! Drives one turn at a time: submits the user's text on a [`ChatSession`],
//! sends the history through a [`ChatTransport`], feeds the reply body to a
//! [`StreamAssembler`] and reports progress as [`SessionUpdate`]s.
//!
//! # Failure Handling
//!
//! Every failure is caught here and turned into a fallback message on the
//! session. Callers never see a transport error escape a turn; the only
//! error `send_message` returns is a rejected submission.
//!
//! # Example
//!
//! ```ignore
//! use listener_core::client::{ChatClient, ClientConfig, HttpChatTransport};
//! use listener_core::ChatSession;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ClientConfig::default();
//! let transport = HttpChatTransport::new(&config.endpoint, config.connect_timeout)?;
//! let client = ChatClient::new(transport, config);
//!
//! let mut session = ChatSession::new();
//! let outcome = client
//!     .send_message(&mut session, "I feel anxious today.", &CancellationToken::new())
//!     .await?;
//! ```

mod transport;

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::messages::{ChatRequest, FinishReason, MessageId, TokenUsage};
use crate::session::{ChatSession, SubmitError};
use crate::streaming::{CompletedReply, StreamAssembler, TurnFailure};

pub use transport::{ByteStream, ChatTransport, HttpChatTransport, TransportError};

/// Default gateway endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/chat";

/// Client timeouts and endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Gateway chat endpoint URL
    pub endpoint: String,
    /// Connection setup limit (default: 10s)
    pub connect_timeout: Duration,
    /// Limit on each wait for response headers or the next body chunk (default: 30s)
    pub read_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// Progress notifications for the rendering surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// User message appended, input disabled
    TurnStarted {
        /// Id of the user message
        user_message: MessageId,
    },
    /// Assistant entry changed; re-render it
    AssistantUpdated {
        /// Id of the assistant entry
        message: MessageId,
        /// Cumulative text
        content: String,
    },
    /// Reply finished, input enabled
    TurnCompleted {
        /// Id of the assistant entry
        message: MessageId,
        /// Why generation stopped
        finish_reason: FinishReason,
        /// Token accounting
        usage: TokenUsage,
    },
    /// Turn failed and the fallback message was appended
    TurnFailed {
        /// What went wrong
        failure: TurnFailure,
    },
    /// User cancelled the turn
    TurnCancelled,
}

/// How a turn ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply received in full
    Completed(CompletedReply),
    /// Reply failed; the session holds a fallback message
    Failed(TurnFailure),
    /// Cancelled by the caller
    Cancelled,
}

/// Per-turn driver over a transport
pub struct ChatClient<T: ChatTransport> {
    transport: T,
    config: ClientConfig,
    updates: Option<mpsc::Sender<SessionUpdate>>,
}

impl<T: ChatTransport> ChatClient<T> {
    /// Create a client
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            updates: None,
        }
    }

    /// Send progress updates to a channel
    #[must_use]
    pub fn with_updates(mut self, tx: mpsc::Sender<SessionUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn notify(&self, update: SessionUpdate) {
        if let Some(tx) = &self.updates {
            // Surface gone; the turn still runs to completion
            let _ = tx.send(update).await;
        }
    }

    /// Submit `text` and stream the reply into the session
    ///
    /// Returns `Err` only when the submission itself is rejected (empty, too
    /// long, or a turn already in flight). Failures after that point end the
    /// turn with a fallback message and `TurnOutcome::Failed`.
    pub async fn send_message(
        &self,
        session: &mut ChatSession,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, SubmitError> {
        let history = session.submit_text(text)?;
        if let Some(user) = session.messages().last() {
            self.notify(SessionUpdate::TurnStarted {
                user_message: user.id.clone(),
            })
            .await;
        }

        let request = ChatRequest::new(history);
        let mut assembler = StreamAssembler::new();

        tracing::info!(
            session = %session.id().0,
            messages = request.messages.len(),
            "Sending chat turn"
        );

        let mut stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(self.cancel_turn(&mut assembler, session).await),
            opened = timeout(self.config.read_timeout, self.transport.open(&request)) => {
                match opened {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => {
                        return Ok(self.fail_turn(&mut assembler, session, transport_failure(e)).await)
                    }
                    Err(_) => {
                        return Ok(self.fail_turn(&mut assembler, session, TurnFailure::Timeout).await)
                    }
                }
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Ok(self.cancel_turn(&mut assembler, session).await);
                }
                next = timeout(self.config.read_timeout, stream.next()) => next,
            };

            let bytes = match next {
                Ok(Some(Ok(bytes))) => bytes,
                Ok(Some(Err(e))) => {
                    return Ok(self.fail_turn(&mut assembler, session, transport_failure(e)).await)
                }
                Ok(None) => break,
                Err(_) => {
                    return Ok(self.fail_turn(&mut assembler, session, TurnFailure::Timeout).await)
                }
            };

            match assembler.push_chunk(session, &bytes) {
                Ok(true) => {
                    if let Some(entry) = session.messages().last() {
                        self.notify(SessionUpdate::AssistantUpdated {
                            message: entry.id.clone(),
                            content: assembler.content().to_string(),
                        })
                        .await;
                    }
                }
                Ok(false) => {}
                Err(failure) => return Ok(self.fail_turn(&mut assembler, session, failure).await),
            }

            if assembler.is_finished() {
                break;
            }
        }

        match assembler.finish(session) {
            Ok(reply) => {
                tracing::info!(
                    session = %session.id().0,
                    chunks = assembler.chunks(),
                    finish_reason = ?reply.finish_reason,
                    "Chat turn complete"
                );
                self.notify(SessionUpdate::TurnCompleted {
                    message: reply.message_id.clone(),
                    finish_reason: reply.finish_reason,
                    usage: reply.usage,
                })
                .await;
                Ok(TurnOutcome::Completed(reply))
            }
            Err(failure) => Ok(self.fail_turn(&mut assembler, session, failure).await),
        }
    }

    async fn fail_turn(
        &self,
        assembler: &mut StreamAssembler,
        session: &mut ChatSession,
        failure: TurnFailure,
    ) -> TurnOutcome {
        assembler.fail(session, &failure);
        self.notify(SessionUpdate::TurnFailed {
            failure: failure.clone(),
        })
        .await;
        TurnOutcome::Failed(failure)
    }

    async fn cancel_turn(
        &self,
        assembler: &mut StreamAssembler,
        session: &mut ChatSession,
    ) -> TurnOutcome {
        assembler.cancel(session);
        self.notify(SessionUpdate::TurnCancelled).await;
        TurnOutcome::Cancelled
    }
}

fn transport_failure(error: TransportError) -> TurnFailure {
    match error {
        TransportError::Status { status, message } => TurnFailure::Status { status, message },
        TransportError::Timeout => TurnFailure::Timeout,
        TransportError::Connect(message) | TransportError::Read(message) => {
            TurnFailure::Transport(message)
        }
    }
}
