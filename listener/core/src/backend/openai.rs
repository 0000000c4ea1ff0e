//! OpenAI-Compatible Backend
//!
//! Streams chat completions from OpenAI, and from Groq through its
//! OpenAI-compatible endpoint.
//!
//! # Chat Completions API
//!
//! - `POST {base}/chat/completions` with `"stream": true`
//! - Response is SSE; each `data:` payload carries `choices[0].delta.content`
//! - `data: [DONE]` ends the stream
//! - With `stream_options.include_usage` (OpenAI only) a final chunk with an
//!   empty `choices` array carries the token usage

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::sse::{spawn_relay, StreamParser};
use super::traits::{ChatBackend, CompletionRequest, ProviderError, StreamingToken};
use crate::messages::{FinishReason, TokenUsage};

/// Default OpenAI API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Groq API base URL (OpenAI-compatible)
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible chat completions client
#[derive(Clone)]
pub struct OpenAiBackend {
    /// Display name ("OpenAI", "Groq")
    name: &'static str,
    /// API base URL without trailing slash
    base_url: String,
    /// Bearer token
    api_key: String,
    /// Whether to request a trailing usage chunk
    include_usage: bool,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OpenAiBackend {
    /// Backend for OpenAI
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            name: "OpenAI",
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            include_usage: true,
            http_client: reqwest::Client::new(),
        }
    }

    /// Backend for Groq
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            name: "Groq",
            base_url: GROQ_BASE_URL.to_string(),
            api_key: api_key.into(),
            include_usage: false,
            http_client: reqwest::Client::new(),
        }
    }

    /// Override the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a preconfigured HTTP client
    #[must_use]
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Get chat completions endpoint URL
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the JSON request body
    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });

        if self.include_usage {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn send_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, ProviderError> {
        let response = self
            .http_client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = self.name, status, "Provider rejected request");
            return Err(ProviderError::from_status(status, &body));
        }

        Ok(spawn_relay(response, OpenAiStreamParser::default()))
    }
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChoicePayload>,
    usage: Option<UsagePayload>,
    error: Option<ErrorPayload>,
}

#[derive(Deserialize)]
struct ChoicePayload {
    #[serde(default)]
    delta: DeltaPayload,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct DeltaPayload {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsagePayload {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

/// Chat completions chunk interpreter
#[derive(Debug, Default)]
struct OpenAiStreamParser {
    finish_reason: Option<FinishReason>,
    usage: TokenUsage,
}

impl StreamParser for OpenAiStreamParser {
    fn on_event(&mut self, data: &str, out: &mut Vec<StreamingToken>) {
        if data.trim() == "[DONE]" {
            out.push(StreamingToken::Complete {
                finish_reason: self.finish_reason.unwrap_or_default(),
                usage: self.usage,
            });
            return;
        }

        let chunk: ChunkPayload = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable completion chunk");
                return;
            }
        };

        if let Some(error) = chunk.error {
            out.push(StreamingToken::Error(ProviderError::Stream(error.message)));
            return;
        }

        if let Some(usage) = chunk.usage {
            self.usage = TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            };
        }

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    out.push(StreamingToken::Token(content));
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(map_finish_reason(&reason));
            }
        }
    }

    fn on_close(&mut self) -> StreamingToken {
        // Some compatible servers close without [DONE] after a finish_reason
        match self.finish_reason {
            Some(finish_reason) => StreamingToken::Complete {
                finish_reason,
                usage: self.usage,
            },
            None => StreamingToken::Error(ProviderError::Stream(
                "connection closed before the reply finished".to_string(),
            )),
        }
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}
