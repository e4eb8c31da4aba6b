use std::time::{Duration, Instant};

use switchboard_catalog::RateLimitConfig;
use switchboard_core::Deadline;
use tokio::sync::Mutex;

use crate::error::RateLimitError;

/// Mutable bucket state, guarded by the bucket mutex
#[derive(Debug)]
struct BucketState {
    /// Fractional token count, clamped to capacity
    tokens: f64,
    last_refill: Instant,
}

/// Classical token bucket for one model
///
/// Refill rate is `max_requests / per_seconds` tokens per second; capacity
/// is `burst_size` (or `max_requests`). Refill-then-deduct runs atomically
/// under the mutex, so concurrent acquires are served first-come-first-
/// served at the lock.
#[derive(Debug)]
pub struct TokenBucket {
    config: RateLimitConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// New bucket, starting full
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens: f64::from(config.capacity()),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Configuration this bucket was built from
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Take `n` tokens, waiting at most until `deadline`
    ///
    /// A rejected acquire leaves the bucket untouched. After one sleep the
    /// acquire is retried once; if another caller drained the refill in
    /// the meantime the call fails rather than queueing indefinitely.
    pub async fn acquire(&self, n: u32, deadline: Deadline) -> Result<(), RateLimitError> {
        let mut slept = false;
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);

                let needed = f64::from(n);
                if state.tokens >= needed {
                    state.tokens -= needed;
                    return Ok(());
                }

                let deficit = needed - state.tokens;
                Duration::from_secs_f64(deficit / self.config.refill_rate())
            };

            let retry_after = wait.as_secs().max(1);
            if slept || wait > deadline.remaining() {
                return Err(RateLimitError::Exceeded { retry_after });
            }

            tokio::time::sleep(wait).await;
            slept = true;
        }
    }

    /// Tokens currently available (after a refill), for observability
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.last_refill = now;

        let refill = elapsed.as_secs_f64() * self.config.refill_rate();
        if refill > 0.0 {
            state.tokens = (state.tokens + refill).min(f64::from(self.config.capacity()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32, per_seconds: u32, burst: Option<u32>) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            per_seconds,
            burst_size: burst,
        }
    }

    fn tight_deadline() -> Deadline {
        Deadline::after(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn burst_is_granted_immediately() {
        let bucket = TokenBucket::new(config(3, 60, None));
        for _ in 0..3 {
            bucket.acquire(1, tight_deadline()).await.unwrap();
        }
        let err = bucket.acquire(1, tight_deadline()).await.unwrap_err();
        let RateLimitError::Exceeded { retry_after } = err;
        assert!(retry_after >= 1);
    }

    #[tokio::test]
    async fn rejected_acquires_do_not_deduct() {
        let bucket = TokenBucket::new(config(1, 60, None));
        bucket.acquire(1, tight_deadline()).await.unwrap();

        let before = bucket.available().await;
        let _ = bucket.acquire(1, tight_deadline()).await.unwrap_err();
        let after = bucket.available().await;

        // Only the elapsed-time refill may differ
        assert!((after - before).abs() < 0.01, "rejection must not consume tokens");
    }

    #[tokio::test]
    async fn waits_within_deadline_then_succeeds() {
        // 20 requests/second: deficit of one token refills in 50ms
        let bucket = TokenBucket::new(config(20, 1, None));
        bucket.acquire(20, Deadline::after(Duration::from_secs(1))).await.unwrap();

        let start = Instant::now();
        bucket.acquire(1, Deadline::after(Duration::from_secs(1))).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn burst_size_raises_capacity() {
        let bucket = TokenBucket::new(config(1, 60, Some(5)));
        for _ in 0..5 {
            bucket.acquire(1, tight_deadline()).await.unwrap();
        }
        assert!(bucket.acquire(1, tight_deadline()).await.is_err());
    }

    #[tokio::test]
    async fn conservation_over_window() {
        // Window of 200ms at 5 req/s: at most burst (2) + refilled (~1)
        let bucket = TokenBucket::new(config(5, 1, Some(2)));
        let mut granted = 0u32;
        let until = Instant::now() + Duration::from_millis(200);
        while Instant::now() < until {
            if bucket.acquire(1, Deadline::after(Duration::ZERO)).await.is_ok() {
                granted += 1;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(granted <= 4, "granted {granted} tokens over a 200ms window");
    }
}
