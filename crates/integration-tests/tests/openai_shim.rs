//! OpenAI-compatible shim scenarios

mod harness;

use futures_util::StreamExt;
use harness::{Gateway, MockUpstream};
use serde_json::{Value, json};

/// The shim answers in chat-completion shape and echoes the model
#[tokio::test]
async fn chat_completions_round_trip() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/v1/chat/completions"))
        .json(&json!({
            "model": "p1/m1",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "p1/m1");
    assert_eq!(body["choices"][0]["message"]["content"], "hello");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["usage"]["total_tokens"], 15);
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));

    gateway.stop().await;
}

/// Typed shim fields become normalized parameters upstream
#[tokio::test]
async fn shim_parameters_reach_the_upstream() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/v1/chat/completions"))
        .json(&json!({
            "model": "p1/m1",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.0,
            "max_tokens": 7,
            "stop": "END"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen = upstream.last_request().unwrap();
    assert_eq!(seen["temperature"], 0.0);
    assert_eq!(seen["max_tokens"], 7);
    assert_eq!(seen["stop"], json!(["END"]));

    gateway.stop().await;
}

/// A model without the provider/model shape is a 400
#[tokio::test]
async fn bare_model_names_are_rejected() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/v1/chat/completions"))
        .json(&json!({
            "model": "m1",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    gateway.stop().await;
}

/// Missing model with no bound session is a 400
#[tokio::test]
async fn missing_model_without_session_is_rejected() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/v1/chat/completions"))
        .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    gateway.stop().await;
}

/// The models listing exposes qualified names of active models
#[tokio::test]
async fn models_listing_uses_qualified_names() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let body: Value = reqwest::Client::new()
        .get(gateway.url("/v1/models"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["object"], "list");
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"p1/m1"));
    assert!(ids.contains(&"p1/m3"));

    gateway.stop().await;
}

/// Streaming yields SSE deltas, a usage chunk, then [DONE]
#[tokio::test]
async fn streaming_chat_completions_end_with_done() {
    let upstream = MockUpstream::start_with_response("hello from stream").await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/v1/chat/completions"))
        .json(&json!({
            "model": "p1/m1",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let mut raw = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        raw.extend_from_slice(&chunk.unwrap());
    }
    let body = String::from_utf8(raw).unwrap();

    assert!(body.contains("[DONE]"), "stream must terminate with [DONE]");

    // Concatenated deltas reproduce the canned text
    let mut text = String::new();
    let mut saw_usage = false;
    for line in body.lines() {
        let Some(data) = line.strip_prefix("data: ") else { continue };
        if data == "[DONE]" {
            break;
        }
        let parsed: Value = serde_json::from_str(data).unwrap();
        if let Some(content) = parsed["choices"][0]["delta"]["content"].as_str() {
            text.push_str(content);
        }
        if parsed.get("usage").is_some_and(|u| !u.is_null()) {
            saw_usage = true;
        }
    }
    assert_eq!(text.trim_end(), "hello from stream");
    assert!(saw_usage, "usage chunk must arrive before [DONE]");

    gateway.stop().await;
}
