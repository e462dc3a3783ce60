//! Rate Limiting Infrastructure
//!
//! Fixed-window counters keyed by (actor, action). A window opens at the first
//! attempt and lasts `window`; once `max_requests` attempts are counted, further
//! attempts are rejected without being counted until the window elapses.
//!
//! Stores must make check-and-increment a single atomic step. The in-process
//! [`MemoryRateLimitStore`] does this under a mutex and is only correct for a
//! single process; the Postgres store lives next to the other repositories.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Counter identity: independent counters per (actor, action) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn new(actor: impl AsRef<str>, action: impl AsRef<str>) -> Self {
        Self(format!("{}:{}", action.as_ref(), actor.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// When the current window closes
    pub reset_at_ms: i64,
}

impl RateLimitResult {
    /// Whole seconds until the window closes, rounded up. Zero once it has.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let left_ms = self.reset_at_ms - now_ms;
        if left_ms <= 0 {
            0
        } else {
            ((left_ms + 999) / 1000) as u64
        }
    }

    /// Unix seconds, for the `X-RateLimit-Reset` header
    pub fn reset_at_secs(&self) -> i64 {
        self.reset_at_ms.div_euclid(1000)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limit store failure: {0}")]
    Store(String),
}

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Atomically count one attempt unless the limit is already reached.
    async fn check_and_increment(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError>;

    /// Current state without counting an attempt.
    async fn peek(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError>;

    /// Drop windows that opened before `older_than_ms`.
    async fn purge_stale(&self, older_than_ms: i64) -> Result<u64, RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start_ms: i64,
    count: u32,
}

impl Window {
    fn is_expired(&self, config: &RateLimitConfig, now_ms: i64) -> bool {
        self.start_ms + config.window_ms() <= now_ms
    }
}

/// Mutex-guarded map; correct within one process only.
#[derive(Debug, Clone, Default)]
pub struct MemoryRateLimitStore {
    windows: Arc<Mutex<HashMap<RateLimitKey, Window>>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<RateLimitKey, Window>>, RateLimitError> {
        self.windows
            .lock()
            .map_err(|_| RateLimitError::Store("rate limit map poisoned".to_string()))
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let mut windows = self.lock()?;
        let window = windows.entry(key.clone()).or_insert(Window {
            start_ms: now_ms,
            count: 0,
        });

        if window.is_expired(config, now_ms) {
            *window = Window {
                start_ms: now_ms,
                count: 0,
            };
        }

        let reset_at_ms = window.start_ms + config.window_ms();
        if window.count >= config.max_requests {
            return Ok(RateLimitResult {
                allowed: false,
                limit: config.max_requests,
                remaining: 0,
                reset_at_ms,
            });
        }

        window.count += 1;
        Ok(RateLimitResult {
            allowed: true,
            limit: config.max_requests,
            remaining: config.max_requests - window.count,
            reset_at_ms,
        })
    }

    async fn peek(
        &self,
        key: &RateLimitKey,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let windows = self.lock()?;
        let result = match windows.get(key) {
            Some(window) if !window.is_expired(config, now_ms) => RateLimitResult {
                allowed: window.count < config.max_requests,
                limit: config.max_requests,
                remaining: config.max_requests.saturating_sub(window.count),
                reset_at_ms: window.start_ms + config.window_ms(),
            },
            _ => RateLimitResult {
                allowed: config.max_requests > 0,
                limit: config.max_requests,
                remaining: config.max_requests,
                reset_at_ms: now_ms + config.window_ms(),
            },
        };
        Ok(result)
    }

    async fn purge_stale(&self, older_than_ms: i64) -> Result<u64, RateLimitError> {
        let mut windows = self.lock()?;
        let before = windows.len();
        windows.retain(|_, w| w.start_ms >= older_than_ms);
        Ok((before - windows.len()) as u64)
    }
}

/// A configured limiter over some store.
pub struct RateLimiter<S: RateLimitStore> {
    store: Arc<S>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl<S: RateLimitStore> Clone for RateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: Arc<S>, config: RateLimitConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one attempt. `allowed == false` means the attempt was not counted.
    pub async fn attempt(&self, key: &RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let now_ms = self.clock.now_ms();
        // A zero budget rejects everything, whatever the store would count.
        let result = if self.config.max_requests == 0 {
            RateLimitResult {
                allowed: false,
                limit: 0,
                remaining: 0,
                reset_at_ms: now_ms + self.config.window_ms(),
            }
        } else {
            self.store
                .check_and_increment(key, &self.config, now_ms)
                .await?
        };

        if !result.allowed {
            tracing::warn!(
                key = key.as_str(),
                limit = result.limit,
                retry_after_secs = result.retry_after_secs(now_ms),
                "Rate limit exceeded"
            );
        }

        Ok(result)
    }

    pub async fn remaining(&self, key: &RateLimitKey) -> Result<u32, RateLimitError> {
        let now_ms = self.clock.now_ms();
        Ok(self.store.peek(key, &self.config, now_ms).await?.remaining)
    }

    /// Seconds until another attempt would be allowed; zero if it would be now.
    pub async fn retry_after(&self, key: &RateLimitKey) -> Result<u64, RateLimitError> {
        let now_ms = self.clock.now_ms();
        let result = self.store.peek(key, &self.config, now_ms).await?;
        if result.allowed {
            Ok(0)
        } else {
            Ok(result.retry_after_secs(now_ms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Duration as ChronoDuration};

    fn limiter(max: u32, window_secs: u64) -> (RateLimiter<MemoryRateLimitStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let limiter = RateLimiter::with_clock(
            Arc::new(MemoryRateLimitStore::new()),
            RateLimitConfig::new(max, window_secs),
            clock.clone(),
        );
        (limiter, clock)
    }

    #[tokio::test]
    async fn test_five_allowed_then_rejected_then_reset() {
        let (limiter, clock) = limiter(5, 60);
        let key = RateLimitKey::new("203.0.113.9", "api");

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes.push(limiter.attempt(&key).await.unwrap().allowed);
        }
        assert_eq!(outcomes, vec![true, true, true, true, true, false]);

        clock.advance(ChronoDuration::seconds(60));
        let result = limiter.attempt(&key).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, 4);
    }

    #[tokio::test]
    async fn test_rejected_attempts_are_not_counted() {
        let (limiter, clock) = limiter(2, 60);
        let key = RateLimitKey::new("k", "api_key");

        limiter.attempt(&key).await.unwrap();
        limiter.attempt(&key).await.unwrap();
        for _ in 0..10 {
            assert!(!limiter.attempt(&key).await.unwrap().allowed);
        }

        // Window still started at the first attempt, not at a rejected one.
        clock.advance(ChronoDuration::seconds(60));
        assert!(limiter.attempt(&key).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_zero_budget_rejects_first_attempt() {
        let (limiter, _clock) = limiter(0, 60);
        let key = RateLimitKey::new("203.0.113.9", "api");

        let result = limiter.attempt(&key).await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.retry_after_secs(limiter.clock.now_ms()), 60);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1, 60);
        let ip = RateLimitKey::new("1", "api");
        let api_key = RateLimitKey::new("1", "api_key");

        assert!(limiter.attempt(&ip).await.unwrap().allowed);
        assert!(!limiter.attempt(&ip).await.unwrap().allowed);
        assert!(limiter.attempt(&api_key).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_remaining_and_retry_after() {
        let (limiter, clock) = limiter(3, 60);
        let key = RateLimitKey::new("user-1", "login");

        assert_eq!(limiter.remaining(&key).await.unwrap(), 3);
        assert_eq!(limiter.retry_after(&key).await.unwrap(), 0);

        for _ in 0..3 {
            limiter.attempt(&key).await.unwrap();
        }
        assert_eq!(limiter.remaining(&key).await.unwrap(), 0);

        clock.advance(ChronoDuration::milliseconds(20_500));
        assert_eq!(limiter.retry_after(&key).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_purge_stale() {
        let store = MemoryRateLimitStore::new();
        let config = RateLimitConfig::new(5, 60);
        let a = RateLimitKey::new("a", "api");
        let b = RateLimitKey::new("b", "api");
        RateLimitStore::check_and_increment(&store, &a, &config, 1_000)
            .await
            .unwrap();
        RateLimitStore::check_and_increment(&store, &b, &config, 90_000)
            .await
            .unwrap();

        assert_eq!(RateLimitStore::purge_stale(&store, 30_000).await.unwrap(), 1);
        let peeked = RateLimitStore::peek(&store, &b, &config, 90_001)
            .await
            .unwrap();
        assert_eq!(peeked.remaining, 4);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let result = RateLimitResult {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_at_ms: 10_001,
        };
        assert_eq!(result.retry_after_secs(9_000), 2);
        assert_eq!(result.retry_after_secs(10_001), 0);
        assert_eq!(result.reset_at_secs(), 10);
    }
}
