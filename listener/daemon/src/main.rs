//! Listener Daemon - HTTP Chat Gateway for AI Listener
//!
//! Serves the streaming chat endpoint that the AI Listener surfaces talk to.
//! The daemon loads configuration, builds the provider backend and hands the
//! gateway router to `axum`.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (OpenAI, 127.0.0.1:3000)
//! OPENAI_API_KEY=sk-... listener-daemon
//!
//! # Use Gemini on another port
//! GEMINI_API_KEY=... listener-daemon --provider gemini --port 8080
//!
//! # With config file
//! listener-daemon --config /etc/ai-listener/listener.toml
//!
//! # Verbose logging
//! RUST_LOG=debug listener-daemon
//! ```
//!
//! # Environment Variables
//!
//! - `LISTENER_CONFIG`: Configuration file path
//! - `LISTENER_HOST` / `LISTENER_PORT`: Bind address
//! - `LISTENER_PROVIDER` / `LISTENER_MODEL`: Provider selection
//! - `OPENAI_API_KEY`, `GEMINI_API_KEY`, `GROQ_API_KEY`: Provider credentials
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown, in-flight streams are drained

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use listener_core::{
    build_router, create_backend, load_config_from_path, ConfigOverrides, GatewayState,
    ProviderKind,
};

/// Listener Daemon - Streaming chat gateway for AI Listener
#[derive(Parser, Debug)]
#[command(name = "listener-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "LISTENER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Model provider (openai, gemini, groq)
    #[arg(long, value_name = "PROVIDER")]
    provider: Option<ProviderKind>,

    /// Model name
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref host) = self.host {
            overrides = overrides.with_host(host.clone());
        }
        if let Some(port) = self.port {
            overrides = overrides.with_port(port);
        }
        if let Some(provider) = self.provider {
            overrides = overrides.with_provider(provider);
        }
        if let Some(ref model) = self.model {
            overrides = overrides.with_model(model.clone());
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("listener_daemon=info".parse()?)
                .add_directive("listener_core=info".parse()?),
        )
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Listener daemon starting");

    let mut config =
        load_config_from_path(args.config.clone()).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        source = %config.source(),
        provider = %config.provider,
        model = config.model(),
        "Configuration loaded"
    );

    let backend = create_backend(&config.backend_config()?)
        .context("Failed to create provider backend")?;
    let state = GatewayState::new(backend, config.gateway_config());
    let app = build_router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(address = %address, "Chat gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Listener daemon stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
