//! Operator control API.
//!
//! A small authenticated HTTP surface for driving the session and the
//! activity log: status, start/stop, log tail, broadcast, and direct send.
//! Auth is a Bearer PIN checked against a SHA-256 digest from config; an
//! empty digest disables auth for local-only deployments.

use crate::rate_limit::RateLimiter;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::config::ApiConfig;
use relay_core::message::OutboundPayload;
use relay_core::traits::Transport;
use relay_memory::{ActivityLog, LogEntry, MemoryStore};
use relay_transport::SessionManager;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<SessionManager>,
    pub transport: Arc<dyn Transport>,
    pub log: ActivityLog,
    pub memory: MemoryStore,
    pub pin_hash: String,
    pub limiter: RateLimiter,
}

impl ApiState {
    pub fn new(
        config: &ApiConfig,
        session: Arc<SessionManager>,
        transport: Arc<dyn Transport>,
        log: ActivityLog,
        memory: MemoryStore,
    ) -> Self {
        Self {
            session,
            transport,
            log,
            memory,
            pin_hash: config.pin_hash.clone(),
            limiter: RateLimiter::new(
                config.rate_max_requests,
                Duration::from_secs(config.rate_window_secs),
            ),
        }
    }

    /// Log the outbound entry, then send through the transport.
    async fn send_logged(&self, conversation_id: &str, text: &str) -> bool {
        if let Err(e) = self
            .log
            .append(&LogEntry::outbound(conversation_id, text))
            .await
        {
            warn!("Failed to log outbound message: {e}");
        }
        match self
            .transport
            .send(conversation_id, &OutboundPayload::text(text))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Send to {conversation_id} failed: {e}");
                false
            }
        }
    }
}

/// SHA-256 hex digest of a PIN, as stored in config.
pub fn pin_digest(pin: &str) -> String {
    let digest = Sha256::digest(pin.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compare without early exit, so timing reveals nothing about the prefix.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Delivery endpoints only make sense against a live session.
fn check_running(state: &ApiState) -> Option<(StatusCode, Json<Value>)> {
    if state.session.status().is_running() {
        return None;
    }
    Some((
        StatusCode::CONFLICT,
        Json(json!({"error": "session is not running"})),
    ))
}

/// Rate limit and auth gate. `None` means the request may proceed.
fn check_auth(state: &ApiState, headers: &HeaderMap) -> Option<(StatusCode, Json<Value>)> {
    if !state.limiter.check() {
        return Some((
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "rate limit exceeded"})),
        ));
    }
    if state.pin_hash.is_empty() {
        return None;
    }

    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match provided {
        Some(pin) if constant_time_eq(&pin_digest(pin), &state.pin_hash) => None,
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid or missing PIN"})),
        )),
    }
}

async fn status(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    let log_entries = state.log.count().await.unwrap_or(0);
    (
        StatusCode::OK,
        Json(json!({
            "status": state.session.status().as_str(),
            "running": state.session.status().is_running(),
            "pairing": state.session.pairing_artifact(),
            "conversations": state.memory.len(),
            "log_entries": log_entries,
        })),
    )
}

async fn start(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    let status = state.session.start();
    (StatusCode::OK, Json(json!({"status": status.as_str()})))
}

async fn stop(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    state.session.stop().await;
    (
        StatusCode::OK,
        Json(json!({"status": state.session.status().as_str()})),
    )
}

#[derive(Deserialize)]
struct LogsQuery {
    limit: Option<i64>,
}

async fn logs(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<LogsQuery>,
) -> (StatusCode, Json<Value>) {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    match state.log.tail(query.limit.unwrap_or(50)).await {
        Ok(entries) => (StatusCode::OK, Json(json!({"entries": entries}))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        ),
    }
}

/// Wipe the activity log, resetting the broadcast audience.
async fn clear_logs(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    match state.log.clear().await {
        Ok(cleared) => (StatusCode::OK, Json(json!({"cleared": cleared}))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        ),
    }
}

#[derive(Deserialize)]
struct BroadcastRequest {
    text: String,
}

/// Send to every conversation the activity log has seen. Partial failure
/// is reported, not aborted.
async fn broadcast(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<BroadcastRequest>,
) -> (StatusCode, Json<Value>) {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    if let Some(stopped) = check_running(&state) {
        return stopped;
    }
    if request.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "text must not be empty"})),
        );
    }

    let audience = match state.log.audience().await {
        Ok(audience) => audience,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    };

    let mut sent = 0usize;
    let mut failed = 0usize;
    for conversation_id in &audience {
        if state.send_logged(conversation_id, &request.text).await {
            sent += 1;
        } else {
            failed += 1;
        }
    }
    info!("Broadcast delivered to {sent}/{} conversations", audience.len());
    (
        StatusCode::OK,
        Json(json!({"sent": sent, "failed": failed, "total": audience.len()})),
    )
}

#[derive(Deserialize)]
struct SendRequest {
    conversation_id: String,
    text: String,
}

async fn send(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<SendRequest>,
) -> (StatusCode, Json<Value>) {
    if let Some(denied) = check_auth(&state, &headers) {
        return denied;
    }
    if let Some(stopped) = check_running(&state) {
        return stopped;
    }
    if request.conversation_id.is_empty() || request.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "conversation_id and text are required"})),
        );
    }
    if state
        .send_logged(&request.conversation_id, &request.text)
        .await
    {
        (StatusCode::OK, Json(json!({"ok": true})))
    } else {
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": "delivery failed"})),
        )
    }
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/logs", get(logs))
        .route("/logs/clear", post(clear_logs))
        .route("/broadcast", post(broadcast))
        .route("/send", post(send))
        .with_state(state)
}

pub async fn serve(state: ApiState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Control API listening on {addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
