//! Backend Factory
//!
//! Builds the configured provider adapter behind a shared trait object.

use std::sync::Arc;

use super::gemini::GeminiBackend;
use super::openai::OpenAiBackend;
use super::traits::{BackendConfig, ChatBackend, ProviderError, ProviderKind};

/// Create a chat backend based on configuration
///
/// # Errors
///
/// Returns `ProviderError::Configuration` if the API key is empty or the
/// HTTP client cannot be built.
///
/// # Example
///
/// ```ignore
/// use listener_core::backend::{create_backend, BackendConfig, ProviderKind};
///
/// let config = BackendConfig::new(ProviderKind::Gemini, api_key);
/// let backend = create_backend(&config)?;
/// let rx = backend.send_streaming(&request).await?;
/// ```
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn ChatBackend>, ProviderError> {
    if config.api_key.trim().is_empty() {
        return Err(ProviderError::Configuration(format!(
            "{} API key is empty",
            config.kind
        )));
    }

    // No overall request timeout: replies stream for as long as the provider talks
    let http_client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|e| ProviderError::Configuration(e.to_string()))?;

    let backend: Arc<dyn ChatBackend> = match config.kind {
        ProviderKind::OpenAi => {
            let mut backend = OpenAiBackend::openai(&config.api_key).with_http_client(http_client);
            if let Some(url) = &config.base_url {
                backend = backend.with_base_url(url);
            }
            Arc::new(backend)
        }
        ProviderKind::Groq => {
            let mut backend = OpenAiBackend::groq(&config.api_key).with_http_client(http_client);
            if let Some(url) = &config.base_url {
                backend = backend.with_base_url(url);
            }
            Arc::new(backend)
        }
        ProviderKind::Gemini => {
            let mut backend = GeminiBackend::new(&config.api_key).with_http_client(http_client);
            if let Some(url) = &config.base_url {
                backend = backend.with_base_url(url);
            }
            Arc::new(backend)
        }
    };

    tracing::info!(
        provider = backend.name(),
        base_url = config.base_url.as_deref().unwrap_or("default"),
        "Chat backend created"
    );

    Ok(backend)
}
