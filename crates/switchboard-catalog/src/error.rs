use http::StatusCode;
use switchboard_core::HttpError;
use thiserror::Error;

/// Errors surfaced by catalog lookups and snapshot installs
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Named provider does not exist
    #[error("provider not found: {name}")]
    ProviderNotFound { name: String },

    /// Named model does not exist under the provider
    #[error("model not found: {provider}/{model}")]
    ModelNotFound { provider: String, model: String },

    /// No credential matches the presented secret
    #[error("unknown credential")]
    CredentialNotFound,

    /// Snapshot violates a catalog invariant
    #[error("invalid catalog: {0}")]
    Invalid(String),

    /// The backing store could not be read; passed through verbatim
    #[error("catalog store unavailable: {0}")]
    StoreUnavailable(String),
}

impl HttpError for CatalogError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ProviderNotFound { .. } | Self::ModelNotFound { .. } => StatusCode::NOT_FOUND,
            Self::CredentialNotFound => StatusCode::FORBIDDEN,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_kind(&self) -> &str {
        match self {
            Self::ProviderNotFound { .. } | Self::ModelNotFound { .. } => "not-found",
            Self::CredentialNotFound => "forbidden",
            Self::Invalid(_) => "bad-request",
            Self::StoreUnavailable(_) => "internal-error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::StoreUnavailable(_) => "catalog store unavailable".to_owned(),
            other => other.to_string(),
        }
    }
}
