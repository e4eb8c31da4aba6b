use http::StatusCode;
use switchboard_adapters::AdapterError;
use switchboard_auth::AuthError;
use switchboard_catalog::CatalogError;
use switchboard_core::HttpError;
use switchboard_ratelimit::RateLimitError;
use thiserror::Error;

/// Router pipeline failures
///
/// Wraps the component errors so handlers map one taxonomy to HTTP.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Tag query matched no usable model
    #[error("no candidate model matches the query")]
    NoCandidate,

    /// Target model exists but is disabled (or its provider is)
    #[error("model {provider}/{model} is not available")]
    ModelDisabled { provider: String, model: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl HttpError for RouterError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NoCandidate => StatusCode::NOT_FOUND,
            Self::ModelDisabled { .. } => StatusCode::NOT_FOUND,
            Self::Catalog(e) => e.status_code(),
            Self::Auth(e) => e.status_code(),
            Self::RateLimit(e) => e.status_code(),
            Self::Adapter(e) => e.status_code(),
        }
    }

    fn error_kind(&self) -> &str {
        match self {
            Self::NoCandidate => "no-candidate",
            Self::ModelDisabled { .. } => "not-found",
            Self::Catalog(e) => e.error_kind(),
            Self::Auth(e) => e.error_kind(),
            Self::RateLimit(e) => e.error_kind(),
            Self::Adapter(e) => e.error_kind(),
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Catalog(e) => e.client_message(),
            Self::Auth(e) => e.client_message(),
            Self::RateLimit(e) => e.client_message(),
            Self::Adapter(e) => e.client_message(),
            other => other.to_string(),
        }
    }
}
