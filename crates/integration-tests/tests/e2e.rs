//! Scenario tests for direct and tag-routed invocation

mod harness;

use harness::{Gateway, MockUpstream};
use serde_json::{Value, json};
use switchboard_recorder::InvocationStatus;

/// Direct invoke against a known model returns the canned reply
#[tokio::test]
async fn direct_invoke_returns_upstream_text() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/models/p1/m1/invoke"))
        .json(&json!({"prompt": "hi", "parameters": {"max_tokens": 5}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["output_text"], "hello");
    assert_eq!(body["usage"]["total_tokens"], 15);

    // The upstream saw the caller's parameter
    assert_eq!(upstream.last_request().unwrap()["max_tokens"], 5);

    gateway.wait_for_records(1).await;
    let records = gateway.records.records();
    assert_eq!(records[0].provider_name, "p1");
    assert_eq!(records[0].model_name, "m1");
    assert_eq!(records[0].status, InvocationStatus::Success);
    assert_eq!(records[0].total_tokens, Some(15));

    gateway.stop().await;
}

/// Tag routing picks the chat-tagged model and records its coordinates
#[tokio::test]
async fn tag_route_selects_matching_model() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/route/invoke"))
        .json(&json!({
            "query": {"tags": ["chat"]},
            "request": {"prompt": "hi"}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["output_text"], "hello");

    gateway.wait_for_records(1).await;
    let records = gateway.records.records();
    assert_eq!(records[0].provider_name, "p1");
    assert_eq!(records[0].model_name, "m1");

    gateway.stop().await;
}

/// A query no model satisfies is a 404 with no success record
#[tokio::test]
async fn tag_route_with_no_candidate_is_not_found() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/route/invoke"))
        .json(&json!({
            "query": {"tags": ["coding", "reasoning"]},
            "request": {"prompt": "hi"}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "no-candidate");
    assert_eq!(upstream.completion_count(), 0);

    let records = gateway.records.records();
    assert!(
        !records.iter().any(|r| r.status == InvocationStatus::Success),
        "no success record may be written"
    );

    gateway.stop().await;
}

/// Unknown model and unknown provider are 404
#[tokio::test]
async fn unknown_target_is_not_found() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(gateway.url("/models/p1/ghost/invoke"))
        .json(&json!({"prompt": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .post(gateway.url("/models/nope/m1/invoke"))
        .json(&json!({"prompt": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    gateway.stop().await;
}

/// Supplying both prompt and messages is a 400
#[tokio::test]
async fn prompt_and_messages_together_are_rejected() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/models/p1/m1/invoke"))
        .json(&json!({
            "prompt": "hi",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(upstream.completion_count(), 0);

    gateway.stop().await;
}

/// Upstream 5xx surfaces as 502 and writes an error record
#[tokio::test]
async fn upstream_failure_maps_to_bad_gateway() {
    let upstream = MockUpstream::start_failing(10).await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/models/p1/m1/invoke"))
        .json(&json!({"prompt": "hi"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "upstream-error");

    gateway.wait_for_records(1).await;
    let records = gateway.records.records();
    assert_eq!(records[0].status, InvocationStatus::Error);
    assert!(records[0].error_message.is_some());
    assert!(records[0].response_text.is_none());

    gateway.stop().await;
}

/// Direct streaming returns JSON lines ending with a final marker, and
/// the aggregated invocation is recorded
#[tokio::test]
async fn direct_streaming_emits_jsonl() {
    let upstream = MockUpstream::start_with_response("streamed reply").await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new()
        .post(gateway.url("/models/p1/m1/invoke"))
        .json(&json!({"prompt": "hi", "stream": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/jsonl"
    );

    let body = response.text().await.unwrap();
    let chunks: Vec<Value> = body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert!(!chunks.is_empty());
    assert_eq!(chunks.last().unwrap()["is_final"], true);

    let text: String = chunks
        .iter()
        .filter_map(|c| c["text"].as_str())
        .collect();
    assert_eq!(text.trim_end(), "streamed reply");

    gateway.wait_for_records(1).await;
    let records = gateway.records.records();
    assert_eq!(records[0].status, InvocationStatus::Success);
    assert_eq!(records[0].response_text.as_deref().map(str::trim_end), Some("streamed reply"));
    assert_eq!(records[0].total_tokens, Some(15));

    gateway.stop().await;
}

/// Health endpoint needs no credentials
#[tokio::test]
async fn health_is_public() {
    let upstream = MockUpstream::start().await.unwrap();
    let gateway = Gateway::start(&upstream.base_url()).await.unwrap();

    let response = reqwest::Client::new().get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    gateway.stop().await;
}
