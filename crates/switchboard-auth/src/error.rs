use http::StatusCode;
use switchboard_core::HttpError;
use thiserror::Error;

/// Authentication and authorization failures
#[derive(Debug, Error)]
pub enum AuthError {
    /// Remote request with no credential while auth is enforced
    #[error("authentication required")]
    Required,

    /// Credential invalid, session expired, or allow-list denial
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Session token does not exist (or has already expired)
    #[error("session not found")]
    SessionNotFound,
}

impl HttpError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Required => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
        }
    }

    fn error_kind(&self) -> &str {
        match self {
            Self::Required => "auth-required",
            Self::Forbidden(_) => "forbidden",
            Self::SessionNotFound => "not-found",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Required => {
                "authentication required: log in via /auth/login or present an API key".to_owned()
            }
            other => other.to_string(),
        }
    }
}
