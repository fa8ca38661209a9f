/// Token-bucket rate limiter
///
/// An explicit limiter instance injected into handler state, never
/// process-wide global state, so it stays testable and safe when several
/// service instances run side by side. The clock is an argument on the inner
/// method so tests can drive refill deterministically.
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone)]
pub struct TokenBucketConfig {
    /// Maximum number of tokens the bucket holds.
    pub capacity: f64,
    /// Tokens restored per second.
    pub refill_per_sec: f64,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            capacity: 20.0,
            refill_per_sec: 10.0,
        }
    }
}

impl From<&RateLimitConfig> for TokenBucketConfig {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            capacity: config.capacity,
            refill_per_sec: config.refill_per_sec,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Token bucket limiter. Cloning shares the underlying bucket.
#[derive(Clone)]
pub struct TokenBucket {
    state: Arc<Mutex<BucketState>>,
    config: TokenBucketConfig,
}

impl TokenBucket {
    pub fn new(config: TokenBucketConfig) -> Self {
        let state = BucketState {
            tokens: config.capacity,
            last_refill: Utc::now(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            config,
        }
    }

    /// Take one token if available.
    pub async fn try_acquire(&self) -> bool {
        self.try_acquire_at(Utc::now()).await
    }

    /// Take one token if available, refilling based on the given clock.
    pub async fn try_acquire_at(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;

        let elapsed_secs = now
            .signed_duration_since(state.last_refill)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;
        state.tokens =
            (state.tokens + elapsed_secs * self.config.refill_per_sec).min(self.config.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            debug!("Rate limiter exhausted, rejecting request");
            false
        }
    }

    /// Current token count, for monitoring.
    pub async fn available(&self) -> f64 {
        self.state.lock().await.tokens
    }
}
