use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use secrecy::SecretString;

use crate::error::AdapterError;

/// Round-robin cursor per provider for multi-key credentials
///
/// Mutates rarely (one counter bump per call) and reads cheaply; the map
/// is shared across adapters so a provider keeps one cursor regardless of
/// which adapter serves it.
#[derive(Default)]
pub struct KeyRing {
    cursors: DashMap<String, AtomicUsize>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys reordered so each call starts at the next cursor position
    pub fn rotated(&self, provider: &str, mut keys: Vec<SecretString>) -> Vec<SecretString> {
        if keys.len() <= 1 {
            return keys;
        }
        let cursor = self.cursors.entry(provider.to_owned()).or_insert_with(|| AtomicUsize::new(0));
        let start = cursor.fetch_add(1, Ordering::Relaxed) % keys.len();
        keys.rotate_left(start);
        keys
    }
}

/// Run `call` with the first key, advancing to the second at most once
///
/// Rotation only happens on auth-failure or rate-limited classifications;
/// any other error is final immediately.
pub async fn with_key_rotation<T, F, Fut>(
    keys: &[SecretString],
    require_key: bool,
    provider_name: &str,
    call: F,
) -> Result<T, AdapterError>
where
    F: Fn(Option<SecretString>) -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let Some(first) = keys.first() else {
        if require_key {
            return Err(AdapterError::AuthFailure(format!(
                "provider {provider_name} has no usable API key"
            )));
        }
        return call(None).await;
    };

    match call(Some(first.clone())).await {
        Err(err) if err.should_rotate_key() && keys.len() > 1 => {
            tracing::warn!(provider = provider_name, error = %err, "rotating to next API key");
            call(Some(keys[1].clone())).await
        }
        other => other,
    }
}
