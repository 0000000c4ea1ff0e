//! Security Module
//!
//! Validation at the boundary where untrusted chat history enters the
//! gateway, plus the gateway's size limit and the client input cap.
//!
//! # Design Philosophy
//!
//! The gateway rejects anything it cannot forward as-is and forwards
//! everything else unmodified. It never trims, truncates or rewrites
//! message content; length policy beyond the body size limit is left to the
//! provider.

use serde::{Deserialize, Serialize};

use crate::messages::{ChatRequest, MessageRole};

/// Default HTTP body limit for `POST /api/chat` (1 MiB)
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Default character cap on a single user input in the chat UI
pub const DEFAULT_MAX_INPUT_CHARS: usize = 500;

/// Size limits enforced by the gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLimits {
    /// Maximum request body size in bytes (default: 1 MiB)
    pub max_request_bytes: usize,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Result of request validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// Request can be forwarded
    Valid,
    /// Request is invalid with reason
    Invalid(String),
}

impl ValidationResult {
    /// Check if the result indicates valid input
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Get the error message if invalid
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(msg) => Some(msg),
        }
    }
}

/// Validator for incoming chat requests
///
/// Rejects:
/// - An empty message list
/// - Empty or whitespace-only content
/// - Client-supplied `system` messages
/// - Control characters other than newline, carriage return and tab
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestValidator;

impl RequestValidator {
    /// Create a new request validator
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate a whole request
    #[must_use]
    pub fn validate(&self, request: &ChatRequest) -> ValidationResult {
        if request.messages.is_empty() {
            return ValidationResult::Invalid("messages must not be empty".to_string());
        }

        for (index, message) in request.messages.iter().enumerate() {
            if message.role == MessageRole::System {
                return ValidationResult::Invalid(format!(
                    "messages[{index}]: role 'system' is not accepted"
                ));
            }
            if let ValidationResult::Invalid(reason) = self.validate_content(&message.content) {
                return ValidationResult::Invalid(format!("messages[{index}]: {reason}"));
            }
        }

        ValidationResult::Valid
    }

    /// Validate one message body
    #[must_use]
    pub fn validate_content(&self, content: &str) -> ValidationResult {
        if content.trim().is_empty() {
            return ValidationResult::Invalid("content must not be empty".to_string());
        }

        // Check for control characters (except newline, tab)
        if content
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r')
        {
            return ValidationResult::Invalid(
                "content contains invalid control characters".to_string(),
            );
        }

        ValidationResult::Valid
    }
}
