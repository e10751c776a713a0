//! Axum route handlers for the talkroom HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`                 — Returns `{"status": "ok", "version": ..}`
//! - `POST /register`               — Join the chat
//! - `POST /reconnect`              — Re-attach keeping retained messages
//! - `POST /unregister`             — Leave the chat (idempotent)
//! - `POST /send`                   — Broadcast a chat message
//! - `POST /talking_stick`          — Claim the talking stick
//! - `POST /talking_stick/release`  — Release the talking stick
//! - `POST /check_event`            — Announce "waiting for a response"
//! - `GET  /messages?username=`     — Drain the mailbox (polling transport)
//! - `GET  /events?username=`       — Server-sent delivery stream
//! - `GET  /feed`                   — Server-sent read-only feed of every message
//! - `GET  /users`                  — Active participants

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::broker::MessageBroker;
use crate::error::ChatError;
use crate::message::Message;
use crate::subscription::{Delivery, SubscriptionChannel};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The one broker every request talks to.
    pub broker: Arc<MessageBroker>,
}

impl AppState {
    pub fn new(broker: Arc<MessageBroker>) -> Self {
        Self { broker }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(MessageBroker::default()))
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/register", post(register_handler))
        .route("/reconnect", post(reconnect_handler))
        .route("/unregister", post(unregister_handler))
        .route("/send", post(send_handler))
        .route("/talking_stick", post(claim_stick_handler))
        .route("/talking_stick/release", post(release_stick_handler))
        .route("/check_event", post(check_event_handler))
        .route("/messages", get(messages_handler))
        .route("/events", get(events_handler))
        .route("/feed", get(feed_handler))
        .route("/users", get(users_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies and error mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UserRequest {
    username: String,
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    username: String,
    message: String,
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Conflict { .. } => StatusCode::CONFLICT,
        ChatError::NotRegistered { .. } => StatusCode::NOT_FOUND,
        ChatError::Denied { .. } => StatusCode::FORBIDDEN,
        ChatError::EmptyDraft => StatusCode::BAD_REQUEST,
        ChatError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn api_error(err: ChatError) -> ApiError {
    debug!("Request rejected: {}", err);
    (
        status_for(&err),
        Json(json!({
            "error": err.to_string(),
            "kind": err.kind(),
        })),
    )
}

fn success() -> Json<Value> {
    Json(json!({"success": true}))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health — liveness check.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "talkroom",
    }))
}

/// POST /register — `{"username"}`; 409 if the name is taken.
async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> ApiResult {
    state.broker.register(&request.username).map_err(api_error)?;
    Ok(success())
}

async fn reconnect_handler(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> ApiResult {
    state.broker.reconnect(&request.username).map_err(api_error)?;
    Ok(success())
}

async fn unregister_handler(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> Json<Value> {
    state.broker.unregister(&request.username);
    success()
}

/// POST /send — `{"username", "message"}`; returns the new message's id and
/// timestamp.
async fn send_handler(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> ApiResult {
    let message = state
        .broker
        .broadcast(&request.username, &request.message)
        .map_err(api_error)?;
    Ok(Json(json!({
        "success": true,
        "id": message.id,
        "timestamp": message.timestamp,
    })))
}

/// POST /talking_stick — claim; 403 while someone else holds it.
async fn claim_stick_handler(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> ApiResult {
    state.broker.claim_stick(&request.username).map_err(api_error)?;
    Ok(Json(json!({
        "success": true,
        "holder": request.username,
    })))
}

async fn release_stick_handler(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> Json<Value> {
    let released = state.broker.release_stick(&request.username);
    Json(json!({
        "success": true,
        "released": released,
    }))
}

/// POST /check_event — tell the room this participant is waiting.
async fn check_event_handler(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> ApiResult {
    state.broker.mark_waiting(&request.username).map_err(api_error)?;
    Ok(success())
}

/// GET /messages — drain and return everything pending.
async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<UserRequest>,
) -> ApiResult {
    let messages = state.broker.drain(&query.username).map_err(api_error)?;
    Ok(Json(json!({ "messages": messages })))
}

/// GET /events — one SSE `data:` frame per drained batch, a `: keepalive`
/// comment while idle, and a final notice when the participant goes away.
///
/// Connecting re-attaches the participant so mail retained across a dropped
/// stream is delivered first.
async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<UserRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    state.broker.reconnect(&query.username).map_err(api_error)?;
    let channel =
        SubscriptionChannel::open(Arc::clone(&state.broker), query.username).map_err(api_error)?;

    let deliveries = channel.into_stream().map(|delivery| match delivery {
        Delivery::Batch(batch) => batch_event(&batch),
        Delivery::Keepalive => Ok(Event::default().comment("keepalive")),
        Delivery::Closed(notice) => batch_event(&[notice]),
    });
    Ok(Sse::new(deliveries))
}

fn batch_event(batch: &[Message]) -> Result<Event, axum::Error> {
    Event::default().json_data(batch)
}

/// GET /feed — every message the broker creates, one per SSE event.
///
/// The stream ends after the shutdown notice so graceful shutdown is not
/// held open by observers.
async fn feed_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let initial = Some((state.broker.feed(), state.broker));
    let feed = stream::unfold(initial, |observer| async move {
        let (mut receiver, broker) = observer?;
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    let event = Event::default().json_data(&message);
                    let next = broker.is_running().then_some((receiver, broker));
                    return Some((event, next));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Feed observer lagged, {} messages skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(feed).keep_alive(KeepAlive::default())
}

/// GET /users — sorted active participants.
async fn users_handler(State(state): State<AppState>) -> ApiResult {
    if !state.broker.is_running() {
        return Err(api_error(ChatError::Unavailable));
    }
    Ok(Json(json!({ "users": state.broker.participants() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use futures::StreamExt;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        call(app, request).await
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        call(app, request).await
    }

    fn setup() -> (AppState, Router) {
        let state = AppState::default();
        let app = app_router(state.clone());
        (state, app)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_, app) = setup();
        let (status, json) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::VERSION);
        assert_eq!(json["service"], "talkroom");
    }

    #[tokio::test]
    async fn test_register_conflict() {
        let (_, app) = setup();
        let (status, json) = post(&app, "/register", json!({"username": "alice"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let (status, json) = post(&app, "/register", json!({"username": "alice"})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["kind"], "conflict");
    }

    #[tokio::test]
    async fn test_send_and_poll() {
        let (_, app) = setup();
        post(&app, "/register", json!({"username": "alice"})).await;
        post(&app, "/register", json!({"username": "bob"})).await;
        get(&app, "/messages?username=alice").await;

        let (status, sent) = post(
            &app,
            "/send",
            json!({"username": "alice", "message": "hello bob"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(sent["id"].is_string());
        assert!(sent["timestamp"].is_string());

        let (status, json) = get(&app, "/messages?username=bob").await;
        assert_eq!(status, StatusCode::OK);
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["sender"], "alice");
        assert_eq!(messages[0]["content"], "hello bob");
        assert_eq!(messages[0]["kind"], "chat");
        assert_eq!(messages[0]["id"], sent["id"]);
    }

    #[tokio::test]
    async fn test_send_from_unknown_user_is_404() {
        let (_, app) = setup();
        let (status, json) = post(&app, "/send", json!({"username": "ghost", "message": "boo"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["kind"], "not_registered");
    }

    #[tokio::test]
    async fn test_talking_stick_routes() {
        let (state, app) = setup();
        post(&app, "/register", json!({"username": "alice"})).await;
        post(&app, "/register", json!({"username": "bob"})).await;

        let (status, json) = post(&app, "/talking_stick", json!({"username": "alice"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["holder"], "alice");

        let (status, json) = post(&app, "/talking_stick", json!({"username": "bob"})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["kind"], "denied");

        let (_, json) = post(&app, "/talking_stick/release", json!({"username": "bob"})).await;
        assert_eq!(json["released"], false);
        let (_, json) = post(&app, "/talking_stick/release", json!({"username": "alice"})).await;
        assert_eq!(json["released"], true);
        assert_eq!(state.broker.stick_holder(), None);
    }

    #[tokio::test]
    async fn test_check_event_and_users() {
        let (state, app) = setup();
        post(&app, "/register", json!({"username": "bob"})).await;
        post(&app, "/register", json!({"username": "alice"})).await;

        let (status, _) = post(&app, "/check_event", json!({"username": "alice"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.broker.waiting(), vec!["alice"]);

        let (_, json) = get(&app, "/users").await;
        assert_eq!(json["users"], json!(["alice", "bob"]));

        post(&app, "/unregister", json!({"username": "bob"})).await;
        let (_, json) = get(&app, "/users").await;
        assert_eq!(json["users"], json!(["alice"]));
    }

    #[tokio::test]
    async fn test_shutdown_is_503() {
        let (state, app) = setup();
        state.broker.shutdown();

        let (status, json) = post(&app, "/register", json!({"username": "late"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["kind"], "unavailable");
        let (status, _) = get(&app, "/users").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_events_stream_delivers_pending_batch() {
        let (state, app) = setup();
        state.broker.register("alice").unwrap();
        state.broker.register("bob").unwrap();
        state.broker.broadcast("alice", "queued for bob").unwrap();

        let request = Request::builder()
            .uri("/events?username=bob")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let mut body = response.into_body().into_data_stream();
        let frame = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with("data: ["));
        assert!(text.contains("queued for bob"));
    }

    #[tokio::test]
    async fn test_dropped_events_stream_keeps_unread_mail() {
        let (state, app) = setup();
        state.broker.register("alice").unwrap();
        state.broker.register("bob").unwrap();
        state.broker.drain("bob").unwrap();
        state.broker.broadcast("alice", "first").unwrap();

        let request = Request::builder()
            .uri("/events?username=bob")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let mut body = response.into_body().into_data_stream();
        let frame = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(String::from_utf8(frame.to_vec()).unwrap().contains("first"));

        for i in 0..3 {
            state.broker.broadcast("alice", &format!("later {i}")).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        drop(body);

        let (status, json) = get(&app, "/messages?username=bob").await;
        assert_eq!(status, StatusCode::OK);
        let contents: Vec<_> = json["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["content"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(contents, vec!["later 0", "later 1", "later 2"]);
    }
}
