// SPDX-License-Identifier: Apache-2.0

//! Fixed-window rate limiter with an optional stricter sub-window cap.
//!
//! State is a per-identifier map held in process memory. That makes the
//! limiter best-effort: a restart clears it and multiple processes fragment
//! it. Accepted limitation, not a bug.
//!
//! Two instances run in the service: one for submission-adjacent actions
//! (10/hour, at most 3/minute) keyed by client IP, one for status lookups
//! (10/hour) keyed by a token fingerprint.

use crate::config::RateLimitPolicy;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Per-identifier window state.
#[derive(Debug)]
struct RateLimitEntry {
    /// Attempts counted in the current window
    count: u32,
    /// When the current window expires
    reset_at: Instant,
    /// Most recent counted attempt
    last_attempt: Instant,
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining attempts in the current window
        remaining: u32,
        /// Time until the window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Remaining attempts; zero when limited.
    pub fn remaining(&self) -> u32 {
        match self {
            Self::Allowed { remaining, .. } => *remaining,
            Self::Limited { .. } => 0,
        }
    }
}

/// Thread-safe fixed-window limiter.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Count one attempt for `identifier` and decide whether it is allowed.
    ///
    /// A fresh or expired window restarts at count = 1. A sub-window denial
    /// leaves the count untouched.
    pub async fn check(&self, identifier: &str) -> RateLimitResult {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(identifier) {
            Some(entry) if now < entry.reset_at => {
                // Stricter sub-window cap first; denial here does not count.
                if let (Some(sub_window), Some(sub_max)) =
                    (self.policy.sub_window(), self.policy.max_per_sub_window)
                {
                    if now.duration_since(entry.last_attempt) < sub_window && entry.count >= sub_max
                    {
                        let retry_after = entry.reset_at - now;
                        debug!(identifier, ?retry_after, "sub-window rate limit hit");
                        return RateLimitResult::Limited { retry_after };
                    }
                }

                if entry.count >= self.policy.max_per_window {
                    let retry_after = entry.reset_at - now;
                    debug!(identifier, ?retry_after, "window rate limit hit");
                    return RateLimitResult::Limited { retry_after };
                }

                entry.count += 1;
                entry.last_attempt = now;
                RateLimitResult::Allowed {
                    remaining: self.policy.max_per_window - entry.count,
                    reset_in: entry.reset_at - now,
                }
            }
            _ => {
                // First attempt, or the previous window expired.
                entries.insert(
                    identifier.to_string(),
                    RateLimitEntry {
                        count: 1,
                        reset_at: now + self.policy.window(),
                        last_attempt: now,
                    },
                );
                RateLimitResult::Allowed {
                    remaining: self.policy.max_per_window - 1,
                    reset_in: self.policy.window(),
                }
            }
        }
    }

    /// Drop entries whose window expired more than one full window ago.
    /// Run on a fixed interval for the life of the process; safe to run
    /// concurrently with checks since expired entries are never consulted.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let window = self.policy.window();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.reset_at + window);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "rate limit entries purged");
        }
    }

    /// Number of identifiers currently tracked.
    pub async fn tracked(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(window_secs: u64, max: u32, sub: Option<(u64, u32)>) -> RateLimitPolicy {
        RateLimitPolicy {
            window_secs,
            max_per_window: max,
            sub_window_secs: sub.map(|(s, _)| s),
            max_per_sub_window: sub.map(|(_, m)| m),
        }
    }

    #[tokio::test]
    async fn nth_attempt_allowed_iff_within_cap() {
        let limiter = RateLimiter::new(policy(3600, 10, None));

        for n in 1..=10 {
            let result = limiter.check("ip-1").await;
            assert!(result.is_allowed(), "attempt {n} should be allowed");
            assert_eq!(result.remaining(), 10 - n);
        }

        let result = limiter.check("ip-1").await;
        assert!(!result.is_allowed(), "11th attempt must be limited");
        assert_eq!(result.remaining(), 0);
    }

    #[tokio::test]
    async fn identifiers_are_independent() {
        let limiter = RateLimiter::new(policy(3600, 1, None));
        assert!(limiter.check("a").await.is_allowed());
        assert!(!limiter.check("a").await.is_allowed());
        assert!(limiter.check("b").await.is_allowed());
    }

    #[tokio::test]
    async fn sub_window_cap_blocks_without_counting() {
        let limiter = RateLimiter::new(policy(3600, 10, Some((1, 3))));

        for _ in 0..3 {
            assert!(limiter.check("ip-1").await.is_allowed());
        }
        // Fourth rapid attempt trips the sub-window cap.
        assert!(!limiter.check("ip-1").await.is_allowed());

        // After the sub-window passes, attempts flow again and the denial
        // did not consume window budget: 3 used, 7 remain.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let result = limiter.check("ip-1").await;
        assert!(result.is_allowed());
        assert_eq!(result.remaining(), 6);
    }

    #[tokio::test]
    async fn expired_window_restarts_fresh() {
        let limiter = RateLimiter::new(policy(1, 2, None));
        assert!(limiter.check("ip-1").await.is_allowed());
        assert!(limiter.check("ip-1").await.is_allowed());
        assert!(!limiter.check("ip-1").await.is_allowed());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let result = limiter.check("ip-1").await;
        assert!(result.is_allowed());
        assert_eq!(result.remaining(), 1);
    }

    #[tokio::test]
    async fn cleanup_purges_only_stale_entries() {
        let limiter = RateLimiter::new(policy(1, 5, None));
        limiter.check("old").await;

        // Not yet a full window past expiry: entry survives.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, 1);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, 0);
    }
}
