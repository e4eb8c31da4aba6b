use std::sync::{Arc, RwLock};

use secrecy::SecretString;

use crate::error::CatalogError;
use crate::snapshot::CatalogSnapshot;
use crate::types::{Credential, Model, ModelQuery, Provider};

/// A model together with its provider, as handed to an adapter
///
/// Both halves come from the same snapshot, so a concurrent refresh cannot
/// pair a model with a newer provider row.
#[derive(Debug, Clone)]
pub struct ModelTarget {
    pub provider: Arc<Provider>,
    pub model: Arc<Model>,
}

impl ModelTarget {
    /// API keys resolvable right now, in configuration order
    pub fn api_keys(&self) -> Vec<SecretString> {
        self.provider.resolved_api_keys()
    }
}

/// Read-through accessor over the current catalog snapshot
///
/// Readers grab an `Arc` to the snapshot and keep using it across awaits;
/// `replace` swaps the pointer under the write lock so the swap is atomic
/// with respect to readers.
#[derive(Clone)]
pub struct Catalog {
    snapshot: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(CatalogSnapshot::default())
    }
}

impl Catalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Current snapshot; stays valid however long the caller holds it
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().expect("catalog lock poisoned").clone()
    }

    /// Install a freshly synced snapshot
    ///
    /// In-flight readers keep their old snapshot; new reads observe the
    /// replacement immediately.
    pub fn replace(&self, snapshot: CatalogSnapshot) {
        let snapshot = Arc::new(snapshot);
        tracing::info!(
            providers = snapshot.provider_count(),
            models = snapshot.model_count(),
            "catalog snapshot replaced"
        );
        *self.snapshot.write().expect("catalog lock poisoned") = snapshot;
    }

    pub fn get_provider(&self, name: &str) -> Result<Arc<Provider>, CatalogError> {
        self.snapshot()
            .provider(name)
            .ok_or_else(|| CatalogError::ProviderNotFound { name: name.to_owned() })
    }

    /// Model with its provider from one consistent snapshot
    pub fn get_model(&self, provider: &str, name: &str) -> Result<ModelTarget, CatalogError> {
        let snapshot = self.snapshot();
        let model = snapshot.model(provider, name).ok_or_else(|| CatalogError::ModelNotFound {
            provider: provider.to_owned(),
            model: name.to_owned(),
        })?;
        let provider = snapshot
            .provider(&model.provider_name)
            .ok_or_else(|| CatalogError::ProviderNotFound {
                name: model.provider_name.clone(),
            })?;
        Ok(ModelTarget { provider, model })
    }

    /// Models matching the query, in catalog order
    ///
    /// Applies activity, tag-superset, and provider-type filters; the
    /// caller's credential filter is the router's concern.
    pub fn list_models(&self, query: &ModelQuery) -> Vec<ModelTarget> {
        let snapshot = self.snapshot();
        let mut out = Vec::new();
        for model in snapshot.models() {
            let Some(provider) = snapshot.provider(&model.provider_name) else {
                continue;
            };
            if !query.include_inactive && (!model.is_active || !provider.is_active) {
                continue;
            }
            if !model.has_tags(&query.tags) {
                continue;
            }
            if !query.provider_types.is_empty() && !query.provider_types.contains(&provider.provider_type) {
                continue;
            }
            out.push(ModelTarget {
                provider,
                model: model.clone(),
            });
        }
        out
    }

    /// Credential whose secret matches, compared in constant time
    ///
    /// Every credential is compared so the scan cost does not depend on
    /// which entry matches.
    pub fn get_credential_by_secret(&self, presented: &str) -> Result<Arc<Credential>, CatalogError> {
        let snapshot = self.snapshot();
        let mut found = None;
        for credential in snapshot.credentials() {
            if credential.matches_secret(presented) && found.is_none() {
                found = Some(credential.clone());
            }
        }
        found.ok_or(CatalogError::CredentialNotFound)
    }

    pub fn get_credential_by_id(&self, id: &str) -> Result<Arc<Credential>, CatalogError> {
        self.snapshot()
            .credentials()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(CatalogError::CredentialNotFound)
    }

    /// Whether any active credential exists (auth enforcement needs one)
    pub fn has_active_credentials(&self) -> bool {
        self.snapshot().credentials().any(|c| c.is_active)
    }
}
