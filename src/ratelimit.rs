//! Fixed-window rate limiting keyed by client identity (IP address).
//!
//! Counters live in a `DashMap` for entry-level locking rather than a single
//! mutex around a `HashMap`, matching spec's "shared in-memory behind a hash
//! map with entry-level locking" framing.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;

struct Window {
    started_at: Instant,
    count: u32,
}

pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
        }
    }

    /// Returns `true` if the request is allowed, `false` if the caller has
    /// exceeded the window's cap. Resets the window on expiry.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window {
                started_at: now,
                count: 0,
            });

        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_cap() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 60_000,
            max_requests: 3,
        });
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
    }

    #[test]
    fn tracks_keys_independently() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 60_000,
            max_requests: 1,
        });
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn resets_after_window_expires() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 10,
            max_requests: 1,
        });
        assert!(limiter.check("x"));
        assert!(!limiter.check("x"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("x"));
    }
}
