//! Listener Core - Streaming Chat Gateway and Reply Assembler for AI Listener
//!
//! This crate holds both ends of the AI Listener chat stream. The gateway
//! relays a conversation to a hosted language model and streams the reply
//! back; the client side merges the arriving fragments into one growing
//! assistant message on a per-session context.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐          ┌──────────────────────────────┐
//! │        CHAT SURFACE          │          │         CHAT GATEWAY         │
//! │  ┌────────────┐              │  POST    │  ┌──────────────────┐        │
//! │  │ChatSession │◄─┐           │ /api/chat│  │ RequestValidator │        │
//! │  └────────────┘  │           │─────────►│  └────────┬─────────┘        │
//! │  ┌────────────┐  │           │          │           ▼                  │
//! │  │  Stream    │──┘           │  data    │  ┌──────────────────┐        │
//! │  │ Assembler  │◄─────────────│◄─────────│  │      Relay       │        │
//! │  └────────────┘  ChatClient  │  stream  │  └────────┬─────────┘        │
//! └──────────────────────────────┘          │           ▼                  │
//!                                           │  ┌──────────────────┐        │
//!                                           │  │   ChatBackend    │──► provider
//!                                           │  │ OpenAI/Gemini/Groq        │
//!                                           │  └──────────────────┘        │
//!                                           └──────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatBackend`]: Provider adapter producing a token channel
//! - [`GatewayState`] / [`build_router`]: The `axum` gateway
//! - [`ChatSession`]: Conversation store, input buffer and turn phase
//! - [`StreamAssembler`]: Applies a data stream body to a session
//! - [`ChatClient`]: Drives one turn over a [`ChatTransport`]
//!
//! # Module Overview
//!
//! - [`backend`]: Provider abstraction and adapters
//! - [`client`]: Turn driver and HTTP transport
//! - [`config`]: TOML, environment and CLI configuration
//! - [`gateway`]: HTTP endpoint, relay and error responses
//! - [`messages`]: Wire and store message types
//! - [`protocol`]: Data stream line format
//! - [`security`]: Request validation and limits
//! - [`session`]: Per-session chat context
//! - [`streaming`]: Reply assembly state machine

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod backend;
pub mod client;
pub mod config;
pub mod gateway;
pub mod messages;
pub mod protocol;
pub mod security;
pub mod session;
pub mod streaming;

// Re-exports for convenience
pub use backend::{
    create_backend, BackendConfig, ChatBackend, CompletionRequest, GeminiBackend, OpenAiBackend,
    ProviderError, ProviderKind, StreamingToken,
};
pub use client::{
    ChatClient, ChatTransport, ClientConfig, HttpChatTransport, SessionUpdate, TransportError,
    TurnOutcome,
};
pub use gateway::{build_router, ApiError, GatewayConfig, GatewayState, DEFAULT_SYSTEM_PROMPT};
pub use messages::{
    ChatMessage, ChatRequest, FinishReason, Message, MessageId, MessageRole, MessageStatus,
    SessionId, TokenUsage,
};
pub use protocol::{DataStreamDecoder, DataStreamPart, ProtocolError};
pub use security::{GatewayLimits, RequestValidator, ValidationResult};
pub use session::{ChatSession, MoodLog, MoodSample, SubmitError, TurnPhase, FALLBACK_REPLY};
pub use streaming::{CompletedReply, StreamAssembler, TurnFailure};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, ConfigError,
    ConfigOverrides, ConfigSource, ListenerConfig, ListenerToml,
};
