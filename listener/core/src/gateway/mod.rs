//! Chat Gateway
//!
//! Stateless HTTP endpoint that relays a conversation to the configured
//! provider and streams the reply back as it is generated.
//!
//! # Endpoints
//!
//! - `POST /api/chat`: body `{ "messages": [...] }`, response is a data
//!   stream (see [`crate::protocol`])
//! - `GET /health`: provider and model in use
//!
//! # Failure Behavior
//!
//! ```text
//! provider fails before first token   ->  4xx/5xx JSON error, no stream
//! provider fails after first token    ->  `3:` error part, no `d:` part
//! provider idle longer than timeout   ->  `3:` error part, no `d:` part
//! ```

mod error;
mod handler;
mod relay;
mod router;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::ChatBackend;
use crate::security::GatewayLimits;

pub use error::ApiError;
pub use handler::{chat, health};
pub use router::{build_cors_layer, build_router};

/// Persona instruction prepended to every conversation
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a supportive, empathetic listener. \
Respond warmly and without judgment, reflect back what the person shares, and \
gently invite them to say more. You are not a licensed therapist; if someone \
mentions being in danger, encourage them to contact local emergency services \
or a crisis line.";

/// Gateway runtime configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Provider model identifier
    pub model: String,
    /// Persona instruction sent as the first message
    pub system_prompt: String,
    /// Sampling temperature (provider default when `None`)
    pub temperature: Option<f32>,
    /// Reply token cap (provider default when `None`)
    pub max_tokens: Option<u32>,
    /// Maximum wait for the provider's first event
    pub first_token_timeout: Duration,
    /// Maximum gap between provider events once streaming
    pub idle_timeout: Duration,
    /// Allowed CORS origins; empty or `*` allows any
    pub cors_origins: Vec<String>,
    /// Request size limits
    pub limits: GatewayLimits,
}

impl GatewayConfig {
    /// Configuration with defaults for a model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: None,
            max_tokens: None,
            first_token_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
            limits: GatewayLimits::default(),
        }
    }
}

/// Shared state handed to every request
///
/// Immutable after startup; cloning is cheap.
#[derive(Clone)]
pub struct GatewayState {
    /// Provider adapter
    pub backend: Arc<dyn ChatBackend>,
    /// Gateway configuration
    pub config: Arc<GatewayConfig>,
}

impl GatewayState {
    /// Bundle a backend and its configuration
    pub fn new(backend: Arc<dyn ChatBackend>, config: GatewayConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }
}
