//! Provider Backend Integration
//!
//! This module provides abstracted access to hosted language-model providers
//! through a common trait interface.
//!
//! # Available Backends
//!
//! - **OpenAI**: chat completions (default)
//! - **Groq**: the OpenAI adapter pointed at Groq's compatible endpoint
//! - **Gemini**: Google's `streamGenerateContent`
//!
//! # Usage
//!
//! ```ignore
//! use listener_core::backend::{create_backend, BackendConfig, CompletionRequest, ProviderKind};
//!
//! let backend = create_backend(&BackendConfig::new(ProviderKind::OpenAi, key))?;
//! let request = CompletionRequest::new("gpt-4o-mini", messages);
//! let rx = backend.send_streaming(&request).await?;
//! ```

mod factory;
mod gemini;
mod openai;
pub(crate) mod sse;
mod traits;

pub use factory::create_backend;
pub use gemini::{GeminiBackend, GEMINI_BASE_URL};
pub use openai::{OpenAiBackend, GROQ_BASE_URL, OPENAI_BASE_URL};
pub use sse::SseDecoder;
pub use traits::{
    BackendConfig, ChatBackend, CompletionRequest, ProviderError, ProviderKind, StreamingToken,
    TOKEN_CHANNEL_CAPACITY,
};
