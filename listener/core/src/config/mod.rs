//! TOML Configuration File Support
//!
//! Centralized configuration loading for the listener daemon, supporting a
//! TOML configuration file at `~/.config/ai-listener/listener.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! Provider API keys are only ever read from the environment.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! cors_origins = ["http://localhost:3000"]
//! max_request_bytes = 1048576
//!
//! [provider]
//! kind = "gemini"
//! model = "gemini-1.5-flash"
//! temperature = 0.7
//!
//! [gateway]
//! first_token_timeout_secs = 30
//! idle_timeout_secs = 30
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendConfig, ProviderKind};
use crate::gateway::{GatewayConfig, DEFAULT_SYSTEM_PROMPT};
use crate::security::{GatewayLimits, DEFAULT_MAX_REQUEST_BYTES};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Bind address
    pub host: Option<String>,

    /// Listen port
    pub port: Option<u16>,

    /// Allowed CORS origins
    pub cors_origins: Option<Vec<String>>,

    /// Request body limit in bytes
    pub max_request_bytes: Option<usize>,
}

/// Provider section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderToml {
    /// Provider family
    pub kind: Option<ProviderKind>,

    /// Model identifier
    pub model: Option<String>,

    /// Base URL override
    pub base_url: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Reply token cap
    pub max_tokens: Option<u32>,
}

/// Gateway section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayToml {
    /// Persona instruction override
    pub system_prompt: Option<String>,

    /// Wait for the provider's first event, in seconds
    pub first_token_timeout_secs: Option<u64>,

    /// Longest gap between provider events, in seconds
    pub idle_timeout_secs: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerToml {
    /// Server configuration section
    pub server: ServerToml,

    /// Provider configuration section
    pub provider: ProviderToml,

    /// Gateway configuration section
    pub gateway: GatewayToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration for the listener daemon
///
/// Use [`load_config`] to load configuration with proper priority handling,
/// apply [`ConfigOverrides`], then call [`validate`](Self::validate).
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,

    /// Request body limit in bytes
    pub max_request_bytes: usize,

    /// Provider family
    pub provider: ProviderKind,

    /// Model override; the provider default applies when `None`
    pub model: Option<String>,

    /// Provider base URL override
    pub base_url: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Reply token cap
    pub max_tokens: Option<u32>,

    /// Persona instruction
    pub system_prompt: String,

    /// Wait for the provider's first event
    pub first_token_timeout: Duration,

    /// Longest gap between provider events
    pub idle_timeout: Duration,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Provider API key, from the environment only
    api_key: Option<String>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            first_token_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            config_file_path: None,
            api_key: None,
            source: ConfigSource::Default,
        }
    }
}

impl ListenerConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Model in use: the configured one or the provider's default
    #[must_use]
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Whether an API key was found for the selected provider
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// `host:port` to bind
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that the configuration can start a gateway
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the API key for the selected
    /// provider is missing, a limit is zero or a CORS origin is not a valid
    /// header value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "no API key for {}; set {}",
                self.provider,
                self.provider.api_key_vars().join(" or ")
            )));
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_request_bytes must be greater than zero".to_string(),
            ));
        }
        if self.first_token_timeout.is_zero() || self.idle_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "gateway timeouts must be greater than zero".to_string(),
            ));
        }
        if self.system_prompt.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "system_prompt must not be empty".to_string(),
            ));
        }
        if let Some(origin) = self
            .cors_origins
            .iter()
            .find(|o| HeaderValue::from_str(o).is_err())
        {
            return Err(ConfigError::ValidationError(format!(
                "invalid CORS origin: {}",
                origin.escape_debug()
            )));
        }
        Ok(())
    }

    /// Provider connection settings
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the API key is missing.
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigError> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            ConfigError::ValidationError(format!("no API key for {}", self.provider))
        })?;
        let mut config = BackendConfig::new(self.provider, api_key);
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url.clone());
        }
        Ok(config)
    }

    /// Gateway runtime settings
    #[must_use]
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            model: self.model().to_string(),
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            first_token_timeout: self.first_token_timeout,
            idle_timeout: self.idle_timeout,
            cors_origins: self.cors_origins.clone(),
            limits: GatewayLimits {
                max_request_bytes: self.max_request_bytes,
            },
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/ai-listener/listener.toml` or
/// `~/.config/ai-listener/listener.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ai-listener").join("listener.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ListenerConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path plus the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ListenerConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or an environment value is malformed.
pub fn load_config_with_env<F>(
    path: Option<PathBuf>,
    env: F,
) -> Result<ListenerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Start with defaults
    let mut config = ListenerConfig::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ListenerToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config, &env)?;
    config.api_key = lookup_api_key(config.provider, &env);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ListenerConfig, toml: ListenerToml) {
    // Server settings
    if let Some(host) = toml.server.host {
        config.host = host;
    }
    if let Some(port) = toml.server.port {
        config.port = port;
    }
    if let Some(origins) = toml.server.cors_origins {
        config.cors_origins = origins;
    }
    if let Some(limit) = toml.server.max_request_bytes {
        config.max_request_bytes = limit;
    }

    // Provider settings
    if let Some(kind) = toml.provider.kind {
        config.provider = kind;
    }
    if toml.provider.model.is_some() {
        config.model = toml.provider.model;
    }
    if toml.provider.base_url.is_some() {
        config.base_url = toml.provider.base_url;
    }
    if toml.provider.temperature.is_some() {
        config.temperature = toml.provider.temperature;
    }
    if toml.provider.max_tokens.is_some() {
        config.max_tokens = toml.provider.max_tokens;
    }

    // Gateway settings
    if let Some(prompt) = toml.gateway.system_prompt {
        config.system_prompt = prompt;
    }
    if let Some(secs) = toml.gateway.first_token_timeout_secs {
        config.first_token_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.gateway.idle_timeout_secs {
        config.idle_timeout = Duration::from_secs(secs);
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut ListenerConfig, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = env("LISTENER_HOST") {
        config.host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(port) = env("LISTENER_PORT") {
        config.port = port.parse().map_err(|_| {
            ConfigError::ValidationError(format!("LISTENER_PORT is not a port number: {port}"))
        })?;
        config.source = ConfigSource::Env;
    }
    if let Some(provider) = env("LISTENER_PROVIDER") {
        config.provider = provider.parse().map_err(ConfigError::ValidationError)?;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env("LISTENER_MODEL") {
        config.model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("LISTENER_BASE_URL") {
        config.base_url = Some(url);
        config.source = ConfigSource::Env;
    }
    if let Some(prompt) = env("LISTENER_SYSTEM_PROMPT") {
        config.system_prompt = prompt;
        config.source = ConfigSource::Env;
    }
    if let Some(origins) = env("LISTENER_CORS_ORIGINS") {
        config.cors_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
        config.source = ConfigSource::Env;
    }
    if let Some(limit) = env("LISTENER_MAX_REQUEST_BYTES") {
        config.max_request_bytes = limit.trim().parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "LISTENER_MAX_REQUEST_BYTES is not a byte count: {limit}"
            ))
        })?;
        config.source = ConfigSource::Env;
    }
    Ok(())
}

/// First non-empty API key variable for a provider
fn lookup_api_key<F>(provider: ProviderKind, env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    provider
        .api_key_vars()
        .iter()
        .filter_map(|var| env(var))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Bind address override
    pub host: Option<String>,

    /// Port override
    pub port: Option<u16>,

    /// Provider override
    pub provider: Option<ProviderKind>,

    /// Model override
    pub model: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bind address override
    #[must_use]
    pub fn with_host(mut self, host: String) -> Self {
        self.host = Some(host);
        self
    }

    /// Set port override
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set provider override
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// Switching provider re-reads that provider's API key from the process
    /// environment.
    pub fn apply(&self, config: &mut ListenerConfig) {
        self.apply_with_env(config, |key| std::env::var(key).ok());
    }

    /// Apply overrides with an explicit environment lookup
    pub fn apply_with_env<F>(&self, config: &mut ListenerConfig, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.host.is_some()
            || self.port.is_some()
            || self.provider.is_some()
            || self.model.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref host) = self.host {
            config.host = host.clone();
        }

        if let Some(port) = self.port {
            config.port = port;
        }

        if let Some(provider) = self.provider {
            if provider != config.provider {
                config.provider = provider;
                config.api_key = lookup_api_key(provider, &env);
            }
        }

        if let Some(ref model) = self.model {
            config.model = Some(model.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
