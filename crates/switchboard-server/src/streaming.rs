use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use switchboard_adapters::ChunkStream;
use switchboard_core::HttpError;

/// Stream chunks as JSON lines
///
/// Each line is one serialized chunk; a mid-stream failure becomes a
/// final `{"error": ...}` line, since the status code is already gone.
pub fn jsonl_response(stream: ChunkStream) -> Response {
    let body = stream.map(|item| {
        let line = match item {
            Ok(chunk) => serde_json::to_string(&chunk).unwrap_or_else(|_| "{}".to_owned()),
            Err(error) => serde_json::json!({
                "error": {
                    "type": error.error_kind(),
                    "message": error.client_message(),
                }
            })
            .to_string(),
        };
        Ok::<_, std::convert::Infallible>(format!("{line}\n"))
    });

    (
        [(header::CONTENT_TYPE, "application/jsonl")],
        Body::from_stream(body),
    )
        .into_response()
}
