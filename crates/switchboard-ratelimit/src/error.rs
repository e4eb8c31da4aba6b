use http::StatusCode;
use switchboard_core::HttpError;
use thiserror::Error;

/// Rate limiter failures
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Bucket empty and the refill wait would overrun the call deadline
    #[error("rate limit exceeded")]
    Exceeded {
        /// Seconds until enough tokens would be available
        retry_after: u64,
    },
}

impl HttpError for RateLimitError {
    fn status_code(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    fn error_kind(&self) -> &str {
        "rate-limited"
    }

    fn client_message(&self) -> String {
        let Self::Exceeded { retry_after } = self;
        format!("rate limit exceeded, retry after {retry_after}s")
    }
}
