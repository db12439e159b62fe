//! Fixed-window request counter keyed by caller identity
//!
//! The first call from an identity opens a window of `period_secs`; calls
//! are admitted until `limit` is reached, after which they are rejected until
//! the window expires and a new one opens at count 1. Bursts straddling a
//! window boundary can therefore reach twice the limit.

use crate::api::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Bucket shared by all anonymous callers when they are limited
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Rate limiting policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether requests are counted at all
    pub enabled: bool,

    /// Requests admitted per window
    pub limit: u32,

    /// Window length in seconds
    pub period_secs: u64,

    /// Count anonymous callers in a shared bucket instead of exempting them
    pub limit_anonymous: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 100,
            period_secs: 3600,
            limit_anonymous: false,
        }
    }
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Per-identity counter for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCounter {
    pub count: u32,
    pub expires_at: Instant,
}

/// Thread-safe fixed-window rate limiter
pub struct RateLimiter {
    config: RateLimitConfig,
    counters: Mutex<HashMap<String, RateCounter>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a call from `identity` against the current window.
    ///
    /// Returns the count after this call, or `None` when the caller is not
    /// counted (limiter disabled or anonymous caller exempt).
    pub fn check(&self, identity: Option<&str>) -> Result<Option<u32>, ApiError> {
        self.check_at(identity, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading
    pub fn check_at(&self, identity: Option<&str>, now: Instant) -> Result<Option<u32>, ApiError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let key = match identity {
            Some(id) => id,
            None if self.config.limit_anonymous => ANONYMOUS_IDENTITY,
            None => return Ok(None),
        };

        let mut counters = self.lock();
        counters.retain(|_, counter| counter.expires_at > now);

        match counters.get_mut(key) {
            None => {
                counters.insert(
                    key.to_string(),
                    RateCounter {
                        count: 1,
                        expires_at: now + self.config.period(),
                    },
                );
                debug!(identity = key, "rate window opened");
                Ok(Some(1))
            }
            Some(counter) if counter.count >= self.config.limit => {
                let remaining = counter.expires_at.saturating_duration_since(now);
                let retry_after_secs = remaining.as_secs_f64().ceil() as u64;
                warn!(identity = key, count = counter.count, "rate limit exceeded");
                Err(ApiError::RateLimitExceeded { retry_after_secs })
            }
            Some(counter) => {
                counter.count += 1;
                Ok(Some(counter.count))
            }
        }
    }

    /// Current window for `identity`, if one is open
    pub fn counter(&self, identity: &str) -> Option<RateCounter> {
        self.lock().get(identity).copied()
    }

    /// Number of identities with a tracked window
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateCounter>> {
        // A poisoned map still holds valid counters
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
