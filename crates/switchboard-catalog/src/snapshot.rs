use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::CatalogError;
use crate::types::{Credential, Model, Provider};

/// Immutable view of the whole catalog
///
/// Built by the external configuration sync, validated once, then shared
/// read-only behind an `Arc`. Lookups clone `Arc`s, never rows.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    providers: IndexMap<String, Arc<Provider>>,
    /// Keyed by `provider/model`
    models: IndexMap<String, Arc<Model>>,
    credentials: Vec<Arc<Credential>>,
}

impl CatalogSnapshot {
    /// Assemble and validate a snapshot
    ///
    /// Enforces the catalog invariant: every active model must reference
    /// an active provider (the type set is closed by construction).
    pub fn new(
        providers: Vec<Provider>,
        models: Vec<Model>,
        credentials: Vec<Credential>,
    ) -> Result<Self, CatalogError> {
        let mut provider_map: IndexMap<String, Arc<Provider>> = IndexMap::new();
        for provider in providers {
            if provider_map.contains_key(&provider.name) {
                return Err(CatalogError::Invalid(format!("duplicate provider: {}", provider.name)));
            }
            provider_map.insert(provider.name.clone(), Arc::new(provider));
        }

        let mut model_map: IndexMap<String, Arc<Model>> = IndexMap::new();
        for model in models {
            let key = model.qualified_name();
            if model_map.contains_key(&key) {
                return Err(CatalogError::Invalid(format!("duplicate model: {key}")));
            }

            let provider = provider_map
                .get(&model.provider_name)
                .ok_or_else(|| CatalogError::Invalid(format!("model {key} references unknown provider")))?;
            if model.is_active && !provider.is_active {
                return Err(CatalogError::Invalid(format!(
                    "active model {key} references disabled provider {}",
                    provider.name
                )));
            }

            if let Some(limit) = &model.rate_limit {
                if limit.max_requests == 0 || limit.per_seconds == 0 {
                    return Err(CatalogError::Invalid(format!("model {key} has a zero rate limit")));
                }
                if let Some(burst) = limit.burst_size
                    && burst < limit.max_requests
                {
                    return Err(CatalogError::Invalid(format!(
                        "model {key}: burst_size must be >= max_requests"
                    )));
                }
            }

            model_map.insert(key, Arc::new(model));
        }

        let mut seen_ids = Vec::new();
        for credential in &credentials {
            if seen_ids.contains(&credential.id) {
                return Err(CatalogError::Invalid(format!("duplicate credential id: {}", credential.id)));
            }
            seen_ids.push(credential.id.clone());
        }

        Ok(Self {
            providers: provider_map,
            models: model_map,
            credentials: credentials.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn provider(&self, name: &str) -> Option<Arc<Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn model(&self, provider: &str, name: &str) -> Option<Arc<Model>> {
        self.models.get(&format!("{provider}/{name}")).cloned()
    }

    /// All models in catalog order
    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }

    /// All credentials in catalog order
    pub fn credentials(&self) -> impl Iterator<Item = &Arc<Credential>> {
        self.credentials.iter()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}
