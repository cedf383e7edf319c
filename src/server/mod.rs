//! HTTP surface.
//!
//! - `POST   /chat`           run one turn, answer as plain text
//! - `GET    /conversations`  transcript of one conversation
//! - `DELETE /conversations`  end a conversation
//! - `GET    /health`         server status

use crate::config::MoveGptConfig;
use crate::error::AgentError;
use crate::session::SessionStore;
use crate::types::preview;
use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const NOT_FOUND_TEXT: &str = "Conversation not found.";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub convo_id: String,
    pub messages: ChatInput,
}

/// Either a bare string or a message list whose last user entry is the input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatInput {
    Text(String),
    List(Vec<MessageItem>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageItem {
    Text(String),
    Message { role: String, content: String },
}

impl ChatInput {
    /// The user's message for this turn, if any.
    pub fn latest_user_text(&self) -> Option<&str> {
        let text = match self {
            ChatInput::Text(text) => Some(text.as_str()),
            ChatInput::List(items) => items.iter().rev().find_map(|item| match item {
                MessageItem::Text(text) => Some(text.as_str()),
                MessageItem::Message { role, content } if role.eq_ignore_ascii_case("user") => {
                    Some(content.as_str())
                }
                MessageItem::Message { .. } => None,
            }),
        }?;
        let text = text.trim();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub user_id: String,
    pub convo_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
    pub tools: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndedResponse {
    pub ended: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error on its way out as `{error, message}` JSON.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Agent(AgentError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Agent(err) => match err {
                AgentError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AgentError::ReasoningProtocol(_) => StatusCode::BAD_GATEWAY,
                AgentError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AgentError::IterationLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AgentError::ConcurrentTurn { .. } => StatusCode::CONFLICT,
                AgentError::UnknownTool(_) | AgentError::ToolExecution { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        ApiError::Agent(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(message) => ErrorBody {
                error: "bad_request".into(),
                message,
            },
            ApiError::Agent(err) => ErrorBody {
                error: err.code().into(),
                message: err.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn chat(
    State(store): State<SessionStore>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(request) = payload?;
    let input = request
        .messages
        .latest_user_text()
        .ok_or_else(|| ApiError::BadRequest("no user message in request".into()))?;

    info!(
        user = %request.user_id,
        convo = %request.convo_id,
        "Chat: {}",
        preview(input)
    );

    match store.chat(&request.user_id, &request.convo_id, input).await {
        Ok(outcome) => Ok(outcome.answer),
        Err(err) => {
            match &err {
                AgentError::ConcurrentTurn { .. } => warn!("Chat rejected: {}", err),
                _ => error!(
                    user = %request.user_id,
                    convo = %request.convo_id,
                    "Chat failed: {}",
                    err
                ),
            }
            Err(err.into())
        }
    }
}

async fn get_conversation(
    State(store): State<SessionStore>,
    query: Result<Query<ConversationQuery>, QueryRejection>,
) -> Result<String, ApiError> {
    let Query(q) = query?;
    Ok(store
        .transcript(&q.user_id, &q.convo_id)
        .await
        .unwrap_or_else(|| NOT_FOUND_TEXT.to_string()))
}

async fn end_conversation(
    State(store): State<SessionStore>,
    query: Result<Query<ConversationQuery>, QueryRejection>,
) -> Result<Json<EndedResponse>, ApiError> {
    let Query(q) = query?;
    let ended = store.end_conversation(&q.user_id, &q.convo_id).await;
    Ok(Json(EndedResponse { ended }))
}

async fn health(State(store): State<SessionStore>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions: store.len().await,
        tools: store
            .registry()
            .names()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Router / serve
// ---------------------------------------------------------------------------

pub fn router(store: SessionStore) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route(
            "/conversations",
            get(get_conversation).delete(end_conversation),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(store)
}

/// Serve until `cancel` fires. Idle conversations are swept when a TTL is set.
pub async fn serve(
    config: &MoveGptConfig,
    store: SessionStore,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    let sweeper = config.session_ttl().map(|ttl| {
        let every = Duration::from_secs(config.session_sweep_secs.max(1));
        tokio::spawn(sweep_idle(store.clone(), ttl, every, cancel.clone()))
    });

    info!("Listening on http://{}", config.listen_addr);

    axum::serve(listener, router(store))
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await
        .context("HTTP server error")?;

    cancel.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!("Sweeper task join error: {}", e);
        }
    }
    info!("Server stopped");
    Ok(())
}

async fn sweep_idle(
    store: SessionStore,
    ttl: Duration,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                store.evict_idle(ttl).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentSettings;
    use crate::engine::EngineReply;
    use crate::testing::{registry_of, ScriptedEngine};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn store(engine: Arc<ScriptedEngine>) -> SessionStore {
        let registry = registry_of(&[("Account Balance", Ok("12.5"))]);
        SessionStore::new(registry, engine, AgentSettings::default(), None)
    }

    fn post_chat(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn picks_the_last_user_message() {
        let input: ChatInput = serde_json::from_value(serde_json::json!([
            {"role": "user", "content": "first"},
            "second",
            {"role": "user", "content": "third"},
            {"role": "assistant", "content": "ignored"}
        ]))
        .unwrap();
        assert_eq!(input.latest_user_text(), Some("third"));

        let blank: ChatInput = serde_json::from_value(serde_json::json!("   ")).unwrap();
        assert_eq!(blank.latest_user_text(), None);
    }

    #[tokio::test]
    async fn chat_then_read_the_transcript() {
        let engine = ScriptedEngine::new(vec![
            Ok(EngineReply::ToolCall {
                name: "Account Balance".into(),
                input: "0xabc".into(),
            }),
            Ok(EngineReply::Final {
                text: "You hold 12.5 APT".into(),
            }),
        ]);
        let app = router(store(engine));

        let response = app
            .clone()
            .oneshot(post_chat(serde_json::json!({
                "user_id": "alice",
                "convo_id": "c1",
                "messages": "What's my balance? 0xabc"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "You hold 12.5 APT");

        let response = app
            .oneshot(get("/conversations?user_id=alice&convo_id=c1"))
            .await
            .unwrap();
        assert_eq!(
            body_text(response).await,
            "User: What's my balance? 0xabc\nAgent: You hold 12.5 APT\n"
        );
    }

    #[tokio::test]
    async fn unknown_conversation_is_reported_as_text() {
        let app = router(store(ScriptedEngine::always(EngineReply::Final {
            text: "ok".into(),
        })));
        let response = app
            .oneshot(get("/conversations?user_id=nobody&convo_id=none"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, NOT_FOUND_TEXT);
    }

    #[tokio::test]
    async fn iteration_cap_maps_to_422() {
        let app = router(store(ScriptedEngine::always(EngineReply::ToolCall {
            name: "Nope".into(),
            input: "x".into(),
        })));
        let response = app
            .oneshot(post_chat(serde_json::json!({
                "user_id": "alice",
                "convo_id": "c1",
                "messages": [{"role": "user", "content": "loop"}]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body.error, "iteration_limit_exceeded");
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let app = router(store(ScriptedEngine::always(EngineReply::Final {
            text: "ok".into(),
        })));
        let response = app
            .oneshot(post_chat(serde_json::json!({"user_id": "alice"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body.error, "bad_request");
    }

    #[tokio::test]
    async fn delete_ends_and_health_counts_sessions() {
        let store = store(ScriptedEngine::always(EngineReply::Final {
            text: "ok".into(),
        }));
        store.chat("alice", "c1", "hi").await.unwrap();
        let app = router(store);

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(health.sessions, 1);
        assert_eq!(health.tools, vec!["Account Balance".to_string()]);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/conversations?user_id=alice&convo_id=c1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let ended: EndedResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(ended.ended);

        let response = app.oneshot(get("/health")).await.unwrap();
        let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(health.sessions, 0);
    }
}
