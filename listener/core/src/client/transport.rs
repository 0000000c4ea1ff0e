//! Chat Transport
//!
//! How the client reaches the gateway. [`HttpChatTransport`] is the real
//! implementation; tests substitute scripted transports.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;

use crate::messages::ChatRequest;

/// Body of a streaming reply, chunk by chunk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Transport errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Could not connect or send the request
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Gateway answered with a non-success status
    #[error("Gateway returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message from the JSON body, or the raw body
        message: String,
    },

    /// Reading the body failed mid-stream
    #[error("Read failed: {0}")]
    Read(String),

    /// No response within the allowed time
    #[error("Timed out")]
    Timeout,
}

/// Sends one chat request and yields the streaming body
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue the request; resolves once response headers arrived
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}

/// `reqwest`-based transport for `POST /api/chat`
#[derive(Clone, Debug)]
pub struct HttpChatTransport {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpChatTransport {
    /// Create a transport for a chat endpoint URL
    ///
    /// `connect_timeout` bounds connection setup only; reads are bounded by
    /// the client driver.
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    /// Endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Read(e.to_string())));
        Ok(Box::pin(stream))
    }
}

/// Pull `error.message` out of a gateway error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
