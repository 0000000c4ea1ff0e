//! Provider Traits
//!
//! Trait definitions for language-model providers. The gateway only ever
//! talks to [`ChatBackend`]; which provider sits behind it is a deployment
//! decision made in configuration.
//!
//! # Design Philosophy
//!
//! A provider is an opaque text generator: it takes the full message list and
//! produces a sequence of text increments followed by either a completion or
//! an error. Implementations handle the provider-specific details (URLs,
//! authentication, request shape, stream format).

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::messages::{ChatMessage, FinishReason, TokenUsage};

/// Capacity of the token channel between a provider task and the gateway
pub const TOKEN_CHANNEL_CAPACITY: usize = 100;

/// Token stream events from providers
#[derive(Clone, Debug)]
pub enum StreamingToken {
    /// A text increment
    Token(String),
    /// Response completed successfully
    Complete {
        /// Why generation stopped
        finish_reason: FinishReason,
        /// Token accounting, zero when the provider does not report it
        usage: TokenUsage,
    },
    /// Error occurred during streaming; nothing follows it
    Error(ProviderError),
}

/// Errors from provider calls
///
/// `Clone` so an error can travel inside a [`StreamingToken`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// API key missing, invalid or not permitted
    #[error("Provider rejected credentials: {0}")]
    Authentication(String),

    /// Model identifier not known to the provider
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Provider rate limit hit
    #[error("Provider rate limit reached: {0}")]
    RateLimited(String),

    /// Provider refused the request itself (too long, malformed)
    #[error("Provider rejected request: {0}")]
    InvalidRequest(String),

    /// No response within the allowed time
    #[error("Provider timed out: {0}")]
    Timeout(String),

    /// Could not reach the provider, or the connection dropped
    #[error("Provider connection failed: {0}")]
    Network(String),

    /// Any other non-success response
    #[error("Provider returned {status}: {message}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Provider error message
        message: String,
    },

    /// The provider stream was malformed or ended early
    #[error("Provider stream failed: {0}")]
    Stream(String),

    /// The backend could not be constructed
    #[error("Provider misconfigured: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Classify a non-success HTTP response from a provider
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body);

        if body.contains("API_KEY_INVALID") || body.contains("invalid_api_key") {
            return Self::Authentication(message);
        }

        match status {
            401 | 403 => Self::Authentication(message),
            404 => Self::UnknownModel(message),
            429 => Self::RateLimited(message),
            400 | 413 | 422 => Self::InvalidRequest(message),
            _ => Self::Upstream { status, message },
        }
    }

    /// Map a `reqwest` failure that happened before or during streaming
    #[must_use]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Pull `error.message` out of a provider error body, or fall back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no error details".to_string()
            } else {
                trimmed.chars().take(512).collect()
            }
        })
}

/// A streaming generation request
#[derive(Clone, Debug, Default)]
pub struct CompletionRequest {
    /// Model to use (provider-specific identifier)
    pub model: String,
    /// Full message list, system message first
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature (provider default when `None`)
    pub temperature: Option<f32>,
    /// Maximum tokens in the reply (provider default when `None`)
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Create a new request with model and messages
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Provider backend trait
///
/// Implement this trait to add support for another provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "OpenAI", "Gemini")
    fn name(&self) -> &str;

    /// Send a request and get a streaming response
    ///
    /// Fails fast with an error if the provider rejects the call before
    /// streaming. Otherwise returns a receiver that yields tokens as they
    /// arrive and ends with exactly one `Complete` or `Error`.
    async fn send_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, ProviderError>;
}

/// Which provider family to talk to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    #[default]
    OpenAi,
    /// Google Gemini
    Gemini,
    /// Groq (OpenAI-compatible)
    Groq,
}

impl ProviderKind {
    /// Model used when none is configured
    #[must_use]
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash",
            Self::Groq => "llama-3.1-8b-instant",
        }
    }

    /// Environment variables that may hold the API key, in lookup order
    #[must_use]
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_GENERATIVE_AI_API_KEY"],
            Self::Groq => &["GROQ_API_KEY"],
        }
    }

    /// Human-readable name
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Gemini => "Gemini",
            Self::Groq => "Groq",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            other => Err(format!(
                "unknown provider '{other}' (expected openai, gemini or groq)"
            )),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Provider connection configuration
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Provider family
    pub kind: ProviderKind,
    /// API key for authentication
    pub api_key: String,
    /// Custom base URL (optional)
    pub base_url: Option<String>,
    /// Connection timeout for provider requests
    pub connect_timeout: std::time::Duration,
}

impl BackendConfig {
    /// Create a configuration with the provider's default endpoint
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            base_url: None,
            connect_timeout: std::time::Duration::from_secs(10),
        }
    }

    /// Override the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}
