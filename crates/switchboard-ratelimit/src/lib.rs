//! Per-model token-bucket rate limiting
//!
//! One bucket per model that carries a rate limit; models without one
//! bypass this crate entirely. Buckets are created lazily on first use
//! and live until process exit.

mod bucket;
mod error;

pub use bucket::TokenBucket;
pub use error::RateLimitError;

use std::sync::Arc;

use dashmap::DashMap;
use switchboard_catalog::RateLimitConfig;
use switchboard_core::Deadline;

/// Keyed collection of token buckets
///
/// Keys are `provider/model` coordinates. A bucket is rebuilt when the
/// model's rate-limit configuration changes across a catalog refresh.
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Arc<TokenBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire one token for `key` under the given configuration
    ///
    /// Sleeps when the bucket is empty but the deficit refills before the
    /// deadline; fails with `rate-limited` otherwise. Tokens spent here
    /// are never refunded, even if the upstream call is later abandoned.
    pub async fn acquire(&self, key: &str, config: RateLimitConfig, deadline: Deadline) -> Result<(), RateLimitError> {
        let bucket = {
            let mut entry = self
                .buckets
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(TokenBucket::new(config)));
            if entry.config() != config {
                // Config changed across a refresh: replace, starting full
                *entry = Arc::new(TokenBucket::new(config));
            }
            Arc::clone(&entry)
        };

        bucket.acquire(1, deadline).await
    }

    /// Bucket currently tracked for `key`, if any
    pub fn bucket(&self, key: &str) -> Option<Arc<TokenBucket>> {
        self.buckets.get(key).map(|b| b.clone())
    }
}
