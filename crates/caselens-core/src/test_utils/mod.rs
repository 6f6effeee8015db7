//! Test utilities for caselens-core
//!
//! Provides record fixtures and a mock model server that speaks both backend
//! wire protocols: the hosted `generateContent` API and the llama.cpp server
//! (`/health` plus OpenAI-compatible chat completions).

pub mod fixtures;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// API key the mock cloud endpoint accepts
pub const MOCK_API_KEY: &str = "test-key";

/// Default completion: markdown-decorated so sanitation is exercised
pub const MOCK_REPLY: &str =
    "## Executive Summary\n\n**Volume is stable.** Recommendation: `Maintain Staff`.\n";

/// How the mock server answers generation requests
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text
    Text(String),
    /// Fail with this HTTP status
    Status(u16),
}

#[derive(Clone)]
struct MockState {
    reply: MockReply,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// Mock model server for backend and engine tests
pub struct MockModelServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockModelServer {
    /// Start the mock server on an available port, answering with [`MOCK_REPLY`]
    pub async fn start() -> Self {
        Self::start_with(MockReply::Text(MOCK_REPLY.to_string())).await
    }

    pub async fn start_with(reply: MockReply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            reply,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/health", get(handle_health))
            .route("/v1/chat/completions", post(handle_chat))
            .route("/v1beta/models/:action", post(handle_generate_content))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bodies of every generation request received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockModelServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// llama.cpp server health endpoint
async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// llama.cpp server OpenAI-compatible chat endpoint
async fn handle_chat(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.requests.lock().unwrap().push(body.clone());
    match state.reply {
        MockReply::Status(code) => error_response(code),
        MockReply::Text(text) => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": body.get("model").cloned().unwrap_or(Value::Null),
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
    }
}

/// Hosted API `models/{model}:generateContent` endpoint
async fn handle_generate_content(
    State(state): State<MockState>,
    Path(action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !action.ends_with(":generateContent") {
        return error_response(404);
    }
    let authorized = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|k| k == MOCK_API_KEY);
    if !authorized {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" } })),
        )
            .into_response();
    }

    state.requests.lock().unwrap().push(body);
    match state.reply {
        MockReply::Status(code) => error_response(code),
        MockReply::Text(text) => Json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        }))
        .into_response(),
    }
}

fn error_response(code: u16) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({ "error": { "code": code, "message": "mock failure" } })),
    )
        .into_response()
}
