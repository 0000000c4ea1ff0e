//! Request handlers

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::Instrument;

use super::relay::Relay;
use super::{ApiError, GatewayState};
use crate::backend::CompletionRequest;
use crate::messages::{ChatMessage, ChatRequest};
use crate::protocol::{DATA_STREAM_CONTENT_TYPE, DATA_STREAM_HEADER, DATA_STREAM_VERSION};
use crate::security::RequestValidator;

/// `POST /api/chat`
///
/// Validates the history, prepends the persona and streams the provider's
/// reply as data stream parts.
pub async fn chat(
    State(state): State<GatewayState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        // Keep 413 from the body limit; every other shape problem is a 400
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, rejection.body_text())
    })?;

    if let Some(reason) = RequestValidator::new().validate(&request).error_message() {
        tracing::debug!(reason, "Rejected chat request");
        return Err(ApiError::bad_request(reason));
    }

    let message_id = format!("msg-{}", uuid::Uuid::new_v4());
    let span = tracing::info_span!(
        "chat_turn",
        request_id = %message_id,
        provider = state.backend.name(),
        messages = request.messages.len(),
    );

    let config = &state.config;
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::system(config.system_prompt.clone()));
    messages.extend(request.messages);

    let mut completion = CompletionRequest::new(config.model.clone(), messages);
    if let Some(temperature) = config.temperature {
        completion = completion.with_temperature(temperature);
    }
    if let Some(max_tokens) = config.max_tokens {
        completion = completion.with_max_tokens(max_tokens);
    }

    let relay = Relay::open(
        state.backend.as_ref(),
        &completion,
        message_id,
        config.first_token_timeout,
        config.idle_timeout,
    )
    .instrument(span.clone())
    .await?;

    span.in_scope(|| tracing::info!("Streaming reply"));

    let headers = [
        (header::CONTENT_TYPE, DATA_STREAM_CONTENT_TYPE),
        (HeaderName::from_static(DATA_STREAM_HEADER), DATA_STREAM_VERSION),
        (header::CACHE_CONTROL, "no-cache"),
    ];
    Ok((headers, Body::from_stream(relay.into_body_stream())).into_response())
}

/// `GET /health`
pub async fn health(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "provider": state.backend.name(),
        "model": state.config.model,
    }))
}
