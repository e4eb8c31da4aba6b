//! Mock OpenAI-compatible upstream returning canned responses

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Canned upstream with request capture and failure injection
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    completion_count: AtomicU32,
    /// Requests to fail with 500 before succeeding
    fail_count: AtomicU32,
    /// Last request body seen, for asserting what went upstream
    last_request: Mutex<Option<Value>>,
    response_content: String,
}

impl MockUpstream {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0, "hello").await
    }

    pub async fn start_with_response(content: &str) -> anyhow::Result<Self> {
        Self::start_inner(0, content).await
    }

    pub async fn start_failing(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(n, "hello").await
    }

    async fn start_inner(fail_count: u32, content: &str) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            completion_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
            last_request: Mutex::new(None),
            response_content: content.to_owned(),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown_clone.cancelled().await })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL to configure as the provider's `base_url`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    /// The most recent request body received
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_chat(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> impl IntoResponse {
    state.completion_count.fetch_add(1, Ordering::Relaxed);
    *state.last_request.lock().unwrap() = Some(body.clone());

    let remaining = state.fail_count.load(Ordering::Relaxed);
    if remaining > 0 {
        state.fail_count.fetch_sub(1, Ordering::Relaxed);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": {"message": "mock upstream intentional failure", "type": "server_error"}
            })),
        )
            .into_response();
    }

    let model = body.get("model").and_then(Value::as_str).unwrap_or("mock-model");

    if body.get("stream").and_then(Value::as_bool).unwrap_or(false) {
        return streaming_body(&state.response_content, model).into_response();
    }

    Json(serde_json::json!({
        "id": "chatcmpl-mock-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": state.response_content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

/// SSE body: one chunk per word, a finish chunk, a usage chunk, [DONE]
fn streaming_body(content: &str, model: &str) -> impl IntoResponse {
    let mut body = String::new();
    let mut push_chunk = |choices: Value, usage: Option<Value>| {
        let mut chunk = serde_json::json!({
            "id": "chatcmpl-mock-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": model,
            "choices": choices,
        });
        if let Some(usage) = usage {
            chunk["usage"] = usage;
        }
        body.push_str(&format!("data: {chunk}\n\n"));
    };

    for word in content.split_whitespace() {
        push_chunk(
            serde_json::json!([{"index": 0, "delta": {"content": format!("{word} ")}, "finish_reason": null}]),
            None,
        );
    }
    push_chunk(
        serde_json::json!([{"index": 0, "delta": {}, "finish_reason": "stop"}]),
        None,
    );
    push_chunk(
        serde_json::json!([]),
        Some(serde_json::json!({"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15})),
    );
    body.push_str("data: [DONE]\n\n");

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
}
