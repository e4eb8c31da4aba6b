use axum::extract::{RawQuery, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use switchboard_auth::{AuthError, extract_sources};

use crate::error::error_response;
use crate::state::AppState;

/// Body of `POST /auth/login`
#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    /// Secret; may instead arrive via `Authorization: Bearer` or
    /// `X-API-Key`
    #[serde(default)]
    pub api_key: Option<String>,
    /// Optional model to pre-bind
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

/// Handle `POST /auth/login`
///
/// Session routes are public paths: each validates its own credential or
/// token, so an unknown token yields 404 rather than a middleware 403.
pub async fn login(
    State(state): State<AppState>,
    headers: http::HeaderMap,
    body: Option<Json<LoginBody>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let secret = body.api_key.clone().or_else(|| {
        let sources = extract_sources(&headers, None);
        sources.api_key_candidates().next().map(str::to_owned)
    });
    let Some(secret) = secret else {
        return error_response(&AuthError::Required);
    };

    // Optional pre-bind; the target must exist and be allowed
    let bind = match (body.provider_name, body.model_name) {
        (Some(provider), Some(model)) => {
            if state.engine.catalog().get_model(&provider, &model).is_err() {
                return error_response(&AuthError::Forbidden(format!(
                    "model {provider}/{model} does not exist"
                )));
            }
            Some((provider, model))
        }
        (None, None) => None,
        _ => {
            return error_response(&AuthError::Forbidden(
                "provider_name and model_name must be supplied together".to_owned(),
            ));
        }
    };

    match state.auth.login(&secret, bind) {
        Ok(token) => Json(serde_json::json!({
            "token": token,
            "expires_in": state.auth.sessions().ttl_seconds(),
            "message": "login successful; present this token on subsequent requests, and bind a model via /auth/bind-model",
        }))
        .into_response(),
        Err(error) => error_response(&error),
    }
}

/// Handle `POST /auth/logout`
pub async fn logout(State(state): State<AppState>, headers: http::HeaderMap, RawQuery(query): RawQuery) -> Response {
    let sources = extract_sources(&headers, query.as_deref());
    let Some(token) = sources.session_candidates().next() else {
        return error_response(&AuthError::Required);
    };

    match state.auth.logout(token) {
        Ok(()) => Json(serde_json::json!({"message": "logged out"})).into_response(),
        Err(error) => error_response(&error),
    }
}

/// Body of `POST /auth/bind-model`
#[derive(Debug, Deserialize)]
pub struct BindModelBody {
    pub provider_name: String,
    pub model_name: String,
}

/// Handle `POST /auth/bind-model`
pub async fn bind_model(
    State(state): State<AppState>,
    headers: http::HeaderMap,
    RawQuery(query): RawQuery,
    Json(body): Json<BindModelBody>,
) -> Response {
    let sources = extract_sources(&headers, query.as_deref());
    let Some(token) = sources.session_candidates().next() else {
        return error_response(&AuthError::Required);
    };

    match state.auth.bind_model(token, &body.provider_name, &body.model_name) {
        Ok(()) => Json(serde_json::json!({
            "message": format!("session bound to {}/{}", body.provider_name, body.model_name)
        }))
        .into_response(),
        Err(error) => error_response(&error),
    }
}
