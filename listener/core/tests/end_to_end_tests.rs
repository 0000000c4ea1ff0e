//! End-to-End Tests
//!
//! A real gateway on a loopback port, a scripted provider behind it and the
//! HTTP client in front of it. Each test plays one full chat turn.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use listener_core::{
    build_router, ChatBackend, ChatClient, ChatSession, ClientConfig, CompletionRequest,
    FinishReason, GatewayConfig, GatewayState, HttpChatTransport, MessageRole, MessageStatus,
    ProviderError, SessionUpdate, StreamingToken, TokenUsage, TurnFailure, TurnOutcome,
    TurnPhase, FALLBACK_REPLY,
};

/// Provider that streams a script with a small delay between tokens
struct PacedBackend {
    reply: Result<Vec<StreamingToken>, ProviderError>,
    pace: Duration,
    linger: Duration,
}

#[async_trait]
impl ChatBackend for PacedBackend {
    fn name(&self) -> &str {
        "Paced"
    }

    async fn send_streaming(
        &self,
        _request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, ProviderError> {
        let script = self.reply.clone()?;
        let (pace, linger) = (self.pace, self.linger);
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for token in script {
                if tx.send(token).await.is_err() {
                    return;
                }
                tokio::time::sleep(pace).await;
            }
            tokio::time::sleep(linger).await;
        });
        Ok(rx)
    }
}

fn paced(script: Vec<StreamingToken>) -> PacedBackend {
    PacedBackend {
        reply: Ok(script),
        pace: Duration::from_millis(10),
        linger: Duration::ZERO,
    }
}

async fn serve(backend: PacedBackend) -> SocketAddr {
    let state = GatewayState::new(Arc::new(backend), GatewayConfig::new("test-model"));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> ChatClient<HttpChatTransport> {
    let config = ClientConfig {
        endpoint: format!("http://{addr}/api/chat"),
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
    };
    let transport = HttpChatTransport::new(config.endpoint.clone(), config.connect_timeout).unwrap();
    ChatClient::new(transport, config)
}

fn token(text: &str) -> StreamingToken {
    StreamingToken::Token(text.to_string())
}

fn complete() -> StreamingToken {
    StreamingToken::Complete {
        finish_reason: FinishReason::Stop,
        usage: TokenUsage {
            prompt_tokens: 30,
            completion_tokens: 9,
        },
    }
}

#[tokio::test]
async fn test_turn_completes_into_single_assistant_message() {
    let addr = serve(paced(vec![
        token("That sounds"),
        token(" hard. "),
        token("Tell me more."),
        complete(),
    ]))
    .await;
    let client = client_for(addr);
    let mut session = ChatSession::new();

    let outcome = client
        .send_message(&mut session, "I feel anxious today.", &CancellationToken::new())
        .await
        .unwrap();

    let reply = match outcome {
        TurnOutcome::Completed(reply) => reply,
        other => panic!("Expected Completed, got {other:?}"),
    };
    assert_eq!(reply.content, "That sounds hard. Tell me more.");
    assert_eq!(reply.usage.completion_tokens, 9);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].content, reply.content);
    assert_eq!(messages[1].status, MessageStatus::Complete);
    assert_eq!(session.phase(), TurnPhase::Idle);
    assert!(session.is_input_enabled());
}

#[tokio::test]
async fn test_second_turn_sends_prior_history() {
    let addr = serve(paced(vec![token("I'm here."), complete()])).await;
    let client = client_for(addr);
    let mut session = ChatSession::new();
    let cancel = CancellationToken::new();

    client
        .send_message(&mut session, "Rough day.", &cancel)
        .await
        .unwrap();
    let outcome = client
        .send_message(&mut session, "Thanks for listening.", &cancel)
        .await
        .unwrap();

    assert!(matches!(outcome, TurnOutcome::Completed(_)));
    let history = session.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].content, "Thanks for listening.");
}

#[tokio::test]
async fn test_provider_auth_failure_shows_fallback() {
    let addr = serve(PacedBackend {
        reply: Err(ProviderError::Authentication("invalid api key".into())),
        pace: Duration::ZERO,
        linger: Duration::ZERO,
    })
    .await;
    let client = client_for(addr);
    let mut session = ChatSession::new();

    let outcome = client
        .send_message(&mut session, "Hello?", &CancellationToken::new())
        .await
        .unwrap();

    match outcome {
        TurnOutcome::Failed(TurnFailure::Status { status, .. }) => assert_eq!(status, 502),
        other => panic!("Expected 502 failure, got {other:?}"),
    }

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].fallback);
    assert_eq!(messages[1].content, FALLBACK_REPLY);
    assert_eq!(session.phase(), TurnPhase::Idle);
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_mid_stream_failure_keeps_partial_reply() {
    let addr = serve(paced(vec![
        token("I hear"),
        token(" you"),
        StreamingToken::Error(ProviderError::Network("connection reset".into())),
    ]))
    .await;
    let client = client_for(addr);
    let mut session = ChatSession::new();

    let outcome = client
        .send_message(&mut session, "Hello", &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        TurnOutcome::Failed(TurnFailure::Gateway(_))
    ));
    let messages = session.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].content, "I hear you");
    assert_eq!(messages[1].status, MessageStatus::Interrupted);
    assert!(messages[2].fallback);
}

#[tokio::test]
async fn test_cancel_mid_reply_stops_without_fallback() {
    let addr = serve(PacedBackend {
        reply: Ok(vec![token("Let me think")]),
        pace: Duration::ZERO,
        linger: Duration::from_secs(10),
    })
    .await;

    let (tx, mut rx) = mpsc::channel(16);
    let client = client_for(addr).with_updates(tx);
    let mut session = ChatSession::new();
    let cancel = CancellationToken::new();

    let watcher = cancel.clone();
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if matches!(update, SessionUpdate::AssistantUpdated { .. }) {
                watcher.cancel();
            }
        }
    });

    let outcome = client
        .send_message(&mut session, "Hello", &cancel)
        .await
        .unwrap();

    assert!(matches!(outcome, TurnOutcome::Cancelled));
    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Let me think");
    assert_eq!(messages[1].status, MessageStatus::Cancelled);
    assert!(!messages.iter().any(|m| m.fallback));
    assert!(session.is_input_enabled());
}

#[tokio::test]
async fn test_unreachable_gateway_fails_turn() {
    // Bind and drop to get a port nothing listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = client_for(addr);
    let mut session = ChatSession::new();

    let outcome = client
        .send_message(&mut session, "Anyone there?", &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        TurnOutcome::Failed(TurnFailure::Transport(_))
    ));
    assert_eq!(session.messages().len(), 2);
    assert!(session.messages()[1].fallback);
}
