//! Read-through catalog of providers, models, and credentials
//!
//! The catalog store itself is external (configuration sync writes it);
//! this crate holds the in-memory snapshot the serving path reads. Writers
//! swap the whole snapshot pointer under an exclusive lock, so readers
//! always observe a consistent catalog. Snapshots already handed out stay
//! valid across the swap.

mod accessor;
mod error;
mod snapshot;
mod types;

pub use accessor::{Catalog, ModelTarget};
pub use error::CatalogError;
pub use snapshot::CatalogSnapshot;
pub use types::{
    Credential, KeySource, Model, ModelConfig, ModelQuery, ParameterLimits, Provider, ProviderType, RateLimitConfig,
    constant_time_eq, normalize_tags,
};
