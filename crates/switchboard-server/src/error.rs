use axum::Json;
use axum::response::{IntoResponse, Response};
use switchboard_core::HttpError;
use switchboard_ratelimit::RateLimitError;
use switchboard_router::RouterError;

/// Render a domain error as the gateway's JSON error shape
pub fn error_response(error: &dyn HttpError) -> Response {
    let status = error.status_code();
    let body = serde_json::json!({
        "error": {
            "type": error.error_kind(),
            "message": error.client_message(),
        }
    });
    (status, Json(body)).into_response()
}

/// As `error_response`, adding `retry-after` for rate-limit rejections
pub fn router_error_response(error: &RouterError) -> Response {
    let mut response = error_response(error);
    if let RouterError::RateLimit(RateLimitError::Exceeded { retry_after }) = error
        && let Ok(value) = retry_after.to_string().parse()
    {
        response.headers_mut().insert("retry-after", value);
    }
    response
}
