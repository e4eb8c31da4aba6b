use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use switchboard_adapters::InvokeRequest;
use switchboard_auth::Principal;
use switchboard_catalog::ModelQuery;

use crate::error::router_error_response;
use crate::state::AppState;
use crate::streaming::jsonl_response;

/// Handle `POST /models/{provider}/{model}/invoke`
pub async fn invoke_model(
    State(state): State<AppState>,
    Path((provider, model)): Path<(String, String)>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<InvokeRequest>,
) -> Response {
    let deadline = state.deadline();

    if request.stream {
        match state
            .engine
            .stream_direct(&provider, &model, &request, &principal, deadline)
            .await
        {
            Ok(stream) => jsonl_response(stream),
            Err(error) => router_error_response(&error),
        }
    } else {
        match state
            .engine
            .invoke_direct(&provider, &model, &request, &principal, deadline)
            .await
        {
            Ok(response) => Json(response).into_response(),
            Err(error) => router_error_response(&error),
        }
    }
}

/// Body of `POST /route/invoke`
#[derive(Debug, Deserialize)]
pub struct RouteInvokeBody {
    #[serde(default)]
    pub query: ModelQuery,
    pub request: InvokeRequest,
}

/// Handle `POST /route/invoke`
pub async fn route_invoke(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<RouteInvokeBody>,
) -> Response {
    let deadline = state.deadline();
    let query = ModelQuery {
        tags: switchboard_catalog::normalize_tags(body.query.tags),
        ..body.query
    };

    if body.request.stream {
        match state.engine.stream_routed(&query, &body.request, &principal, deadline).await {
            Ok((target, stream)) => {
                tracing::debug!(model = %target.model.qualified_name(), "tag query routed");
                jsonl_response(stream)
            }
            Err(error) => router_error_response(&error),
        }
    } else {
        match state.engine.invoke_routed(&query, &body.request, &principal, deadline).await {
            Ok((target, response)) => {
                tracing::debug!(model = %target.model.qualified_name(), "tag query routed");
                Json(response).into_response()
            }
            Err(error) => router_error_response(&error),
        }
    }
}
