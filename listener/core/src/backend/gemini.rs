//! Gemini Backend
//!
//! Streams replies from Google's Generative Language API.
//!
//! # Gemini API
//!
//! - `POST {base}/models/{model}:streamGenerateContent?alt=sse`
//! - API key in the `x-goog-api-key` header
//! - System messages go to `systemInstruction`; the rest become `contents`
//!   with roles `user` and `model`
//! - Each SSE payload carries `candidates[0].content.parts[*].text`; the last
//!   one carries `finishReason` and `usageMetadata`

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::sse::{spawn_relay, StreamParser};
use super::traits::{ChatBackend, CompletionRequest, ProviderError, StreamingToken};
use crate::messages::{FinishReason, MessageRole, TokenUsage};

/// Default Gemini API base URL
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini streaming client
#[derive(Clone)]
pub struct GeminiBackend {
    /// API base URL without trailing slash
    base_url: String,
    /// API key
    api_key: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.into(),
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

    /// Get streaming endpoint URL for a model
    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    /// Build the JSON request body
    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| {
                let role = if m.role == MessageRole::Assistant {
                    "model"
                } else {
                    "user"
                };
                serde_json::json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = serde_json::json!({ "contents": contents });

        if !system.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": system.join("\n\n") }]
            });
        }

        let mut generation = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            generation.insert("temperature".to_string(), serde_json::json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            generation.insert("maxOutputTokens".to_string(), serde_json::json!(max_tokens));
        }
        if !generation.is_empty() {
            body["generationConfig"] = serde_json::Value::Object(generation);
        }

        body
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn send_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, ProviderError> {
        let response = self
            .http_client
            .post(self.stream_url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = "Gemini", status, "Provider rejected request");
            return Err(ProviderError::from_status(status, &body));
        }

        Ok(spawn_relay(response, GeminiStreamParser::default()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkPayload {
    #[serde(default)]
    candidates: Vec<CandidatePayload>,
    usage_metadata: Option<UsagePayload>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ErrorPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePayload {
    content: Option<ContentPayload>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentPayload {
    #[serde(default)]
    parts: Vec<PartPayload>,
}

#[derive(Deserialize)]
struct PartPayload {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsagePayload {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

/// `streamGenerateContent` chunk interpreter
#[derive(Debug, Default)]
struct GeminiStreamParser {
    usage: TokenUsage,
}

impl StreamParser for GeminiStreamParser {
    fn on_event(&mut self, data: &str, out: &mut Vec<StreamingToken>) {
        let chunk: ChunkPayload = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable Gemini chunk");
                return;
            }
        };

        if let Some(error) = chunk.error {
            out.push(StreamingToken::Error(ProviderError::Stream(error.message)));
            return;
        }

        if let Some(usage) = chunk.usage_metadata {
            self.usage = TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
            };
        }

        if chunk
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .is_some()
        {
            out.push(StreamingToken::Complete {
                finish_reason: FinishReason::ContentFilter,
                usage: self.usage,
            });
            return;
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return;
        };

        if let Some(content) = candidate.content {
            for text in content.parts.into_iter().filter_map(|p| p.text) {
                if !text.is_empty() {
                    out.push(StreamingToken::Token(text));
                }
            }
        }

        if let Some(reason) = candidate.finish_reason {
            out.push(StreamingToken::Complete {
                finish_reason: map_finish_reason(&reason),
                usage: self.usage,
            });
        }
    }

    fn on_close(&mut self) -> StreamingToken {
        StreamingToken::Error(ProviderError::Stream(
            "connection closed before the reply finished".to_string(),
        ))
    }
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Other,
    }
}
