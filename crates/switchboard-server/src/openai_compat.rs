//! OpenAI-compatible shim
//!
//! `POST /v1/chat/completions` selects the target from the body's
//! `model` field (`provider/model`) or from the session's bound model,
//! translates through the normalized pipeline, and answers in OpenAI
//! shape. `GET /v1/models` lists the catalog's active models.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures_util::StreamExt;
use indexmap::IndexMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_adapters::{ChunkStream, InvokeRequest, InvokeResponse, Message, Role};
use switchboard_auth::{CredentialSources, Principal};
use switchboard_catalog::ModelQuery;
use switchboard_core::HttpError;

use crate::error::{error_response, router_error_response};
use crate::state::AppState;

// -- Wire types --

/// Chat completion request body
#[derive(Debug, Deserialize)]
pub struct ShimRequest {
    /// `provider/model`, or absent when a bound session supplies the
    /// target
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ShimMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    /// String or array of strings
    #[serde(default)]
    pub stop: Option<Value>,
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    /// Accepted for wire compatibility; one choice is always returned
    #[serde(default)]
    #[allow(dead_code)]
    pub n: Option<u32>,
    /// Accepted for wire compatibility; not used for attribution
    #[serde(default)]
    #[allow(dead_code)]
    pub user: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub top_k: Option<u64>,
    #[serde(default)]
    pub repetition_penalty: Option<f64>,
}

/// Message in the shim request
#[derive(Debug, Clone, Deserialize)]
pub struct ShimMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completion response body
#[derive(Debug, Serialize)]
pub struct ShimResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ShimChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ShimUsage>,
}

#[derive(Debug, Serialize)]
pub struct ShimChoice {
    pub index: u32,
    pub message: ShimChoiceMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ShimChoiceMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ShimUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

// -- Handlers --

/// Handle `POST /v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Extension(sources): Extension<CredentialSources>,
    Json(body): Json<ShimRequest>,
) -> Response {
    if body.messages.is_empty() {
        return bad_request("messages must not be empty");
    }

    // Session binding first, body model second
    let (provider, model) = match resolve_target(&principal, body.model.as_deref()) {
        Ok(target) => target,
        Err(response) => return response,
    };

    // A body model that names something other than the catalog
    // coordinates overrides the remote identifier for this call
    let qualified = format!("{provider}/{model}");
    let remote_identifier_override = body
        .model
        .as_ref()
        .filter(|m| **m != qualified)
        .cloned();

    // Bind (or re-bind) the session to the model being used
    if let Some(session) = principal.session()
        && session.bound_model.as_ref() != Some(&(provider.clone(), model.clone()))
        && let Some(token) = sources.session_candidates().next()
        && let Err(error) = state.auth.bind_model(token, &provider, &model)
    {
        return error_response(&error);
    }

    let messages: Vec<Message> = body
        .messages
        .iter()
        .filter_map(|m| {
            let content = m.content.clone().filter(|c| !c.is_empty())?;
            let role = match m.role.as_str() {
                "system" => Role::System,
                "user" => Role::User,
                "assistant" => Role::Assistant,
                _ => return None,
            };
            Some(Message::text(role, content))
        })
        .collect();
    if messages.is_empty() {
        return bad_request("at least one system, user, or assistant message with content is required");
    }

    let is_stream = body.stream.unwrap_or(false);
    let request = InvokeRequest {
        prompt: None,
        messages: Some(messages),
        parameters: shim_parameters(&body),
        stream: is_stream,
        remote_identifier_override,
    };

    let deadline = state.deadline();
    if is_stream {
        match state
            .engine
            .stream_direct(&provider, &model, &request, &principal, deadline)
            .await
        {
            Ok(stream) => sse_response(stream, qualified).into_response(),
            Err(error) => router_error_response(&error),
        }
    } else {
        match state
            .engine
            .invoke_direct(&provider, &model, &request, &principal, deadline)
            .await
        {
            Ok(response) => Json(shim_response(&response, qualified)).into_response(),
            Err(error) => router_error_response(&error),
        }
    }
}

/// Handle `GET /v1/models`
pub async fn list_models(State(state): State<AppState>) -> Response {
    let mut ids: Vec<String> = state
        .engine
        .catalog()
        .list_models(&ModelQuery::default())
        .iter()
        .map(|target| target.model.qualified_name())
        .collect();
    ids.sort();
    ids.dedup();

    let created = chrono::Utc::now().timestamp();
    let data: Vec<Value> = ids
        .into_iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "object": "model",
                "created": created,
                "owned_by": "switchboard",
            })
        })
        .collect();

    Json(serde_json::json!({"object": "list", "data": data})).into_response()
}

// -- Helpers --

/// Target coordinates from the session binding or the body model
fn resolve_target(principal: &Principal, body_model: Option<&str>) -> Result<(String, String), Response> {
    if let Some((provider, model)) = principal.bound_model() {
        return Ok((provider.clone(), model.clone()));
    }

    let Some(model) = body_model else {
        return Err(bad_request(
            "model is required (format: provider/model) unless the session has a bound model",
        ));
    };

    match model.split_once('/') {
        Some((provider, name)) if !provider.is_empty() && !name.is_empty() => {
            Ok((provider.to_owned(), name.to_owned()))
        }
        _ => Err(bad_request("model must use the provider/model format")),
    }
}

/// Collect the typed shim fields into the normalized parameter map
fn shim_parameters(body: &ShimRequest) -> IndexMap<String, Value> {
    let mut parameters = IndexMap::new();
    if let Some(v) = body.temperature {
        parameters.insert("temperature".to_owned(), Value::from(v));
    }
    if let Some(v) = body.top_p {
        parameters.insert("top_p".to_owned(), Value::from(v));
    }
    if let Some(v) = body.max_tokens {
        parameters.insert("max_tokens".to_owned(), Value::from(v));
    }
    if let Some(stop) = &body.stop {
        let normalized = match stop {
            Value::String(s) => Value::from(vec![s.clone()]),
            other => other.clone(),
        };
        parameters.insert("stop".to_owned(), normalized);
    }
    if let Some(v) = body.presence_penalty {
        parameters.insert("presence_penalty".to_owned(), Value::from(v));
    }
    if let Some(v) = body.frequency_penalty {
        parameters.insert("frequency_penalty".to_owned(), Value::from(v));
    }
    if let Some(v) = body.top_k {
        parameters.insert("top_k".to_owned(), Value::from(v));
    }
    if let Some(v) = body.repetition_penalty {
        parameters.insert("repetition_penalty".to_owned(), Value::from(v));
    }
    parameters
}

/// Normalized response in chat-completion shape
fn shim_response(response: &InvokeResponse, model: String) -> ShimResponse {
    let usage = response.usage.map(|u| ShimUsage {
        prompt_tokens: u.prompt_tokens.unwrap_or(0),
        completion_tokens: u.completion_tokens.unwrap_or(0),
        total_tokens: u.total_tokens.unwrap_or(0),
        cost: response.cost,
    });

    ShimResponse {
        id: completion_id(),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        model,
        choices: vec![ShimChoice {
            index: 0,
            message: ShimChoiceMessage {
                role: "assistant",
                content: response.output_text.clone(),
            },
            finish_reason: "stop",
        }],
        usage,
    }
}

/// Streaming response in chat-completion-chunk shape
fn sse_response(stream: ChunkStream, model: String) -> Sse<impl futures_util::Stream<Item = Result<Event, axum::Error>>> {
    let id = completion_id();
    let created = chrono::Utc::now().timestamp();

    let events = stream.map(move |item| match item {
        Ok(chunk) if chunk.is_final => Ok(Event::default().data("[DONE]")),
        Ok(chunk) => {
            let mut payload = serde_json::json!({
                "id": id,
                "object": "chat.completion.chunk",
                "created": created,
                "model": model,
                "choices": [{
                    "index": 0,
                    "delta": {"content": chunk.text},
                    "finish_reason": chunk.finish_reason,
                }],
            });
            if let Some(usage) = chunk.usage {
                payload["usage"] = serde_json::json!({
                    "prompt_tokens": usage.prompt_tokens,
                    "completion_tokens": usage.completion_tokens,
                    "total_tokens": usage.total_tokens,
                    "cost": chunk.cost,
                });
            }
            Ok(Event::default().data(payload.to_string()))
        }
        Err(error) => {
            let payload = serde_json::json!({
                "error": {
                    "type": error.error_kind(),
                    "message": error.client_message(),
                }
            });
            Ok(Event::default().data(payload.to_string()))
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn bad_request(message: &str) -> Response {
    (
        http::StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": {"type": "bad-request", "message": message}
        })),
    )
        .into_response()
}

/// Synthetic chat-completion id
fn completion_id() -> String {
    let mut bytes = [0u8; 15];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("chatcmpl-{hex}")
}
