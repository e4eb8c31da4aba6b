use http::StatusCode;
use switchboard_core::HttpError;
use thiserror::Error;

/// Classified adapter failures
///
/// The adapter maps upstream status codes into these kinds so callers can
/// decide about retries; the adapter itself never retries beyond the
/// single key-rotation step.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The normalized request cannot be expressed for this upstream
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upstream rejected our credential (401/403)
    #[error("upstream authentication failed: {0}")]
    AuthFailure(String),

    /// Upstream does not know the requested resource
    #[error("upstream resource not found: {0}")]
    NotFound(String),

    /// Upstream throttled the call (429)
    #[error("upstream rate limited")]
    RateLimited {
        /// Seconds suggested by the upstream, when provided
        retry_after: Option<u64>,
    },

    /// The call deadline elapsed while waiting on the upstream
    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// Upstream returned a server-side failure
    #[error("upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The upstream could not be reached at all
    #[error("network error: {0}")]
    Network(String),
}

impl AdapterError {
    /// Classify an upstream HTTP status with its response body
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::AuthFailure(body),
            StatusCode::NOT_FOUND => Self::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { retry_after: None },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Self::UpstreamTimeout(body),
            s if s.is_server_error() => Self::Upstream {
                status: s.as_u16(),
                body,
            },
            s => Self::BadRequest(format!("upstream rejected request ({s}): {body}")),
        }
    }

    /// Classify a transport-level failure
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Whether a caller could plausibly succeed by retrying elsewhere
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::UpstreamTimeout(_) | Self::Upstream { .. } | Self::Network(_)
        )
    }

    /// Whether the adapter should advance to the provider's next API key
    pub const fn should_rotate_key(&self) -> bool {
        matches!(self, Self::AuthFailure(_) | Self::RateLimited { .. })
    }
}

impl HttpError for AdapterError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::AuthFailure(_) | Self::Upstream { .. } | Self::Network(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_kind(&self) -> &str {
        match self {
            Self::BadRequest(_) => "bad-request",
            Self::NotFound(_) => "not-found",
            Self::RateLimited { .. } => "rate-limited",
            Self::UpstreamTimeout(_) => "upstream-timeout",
            Self::AuthFailure(_) | Self::Upstream { .. } | Self::Network(_) => "upstream-error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::AuthFailure(_) => "upstream authentication failed".to_owned(),
            Self::Network(_) => "upstream unreachable".to_owned(),
            other => other.to_string(),
        }
    }
}
