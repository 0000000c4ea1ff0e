//! Router assembly

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::{chat, health};
use super::GatewayState;

/// Build the gateway router with CORS, tracing and body limits
pub fn build_router(state: GatewayState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let body_limit = DefaultBodyLimit::max(state.config.limits.max_request_bytes);

    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer for the configured origins
///
/// An empty list or a `*` entry allows any origin. Otherwise only origins
/// that form valid header values are allowed; invalid entries are dropped,
/// never widened to any origin.
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin.escape_debug(), "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}
