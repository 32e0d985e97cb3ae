use std::time::{Duration, Instant};

use dashmap::DashMap;
use occ_users::{RateLimitTier, RateLimits};

/// Fixed-window per-minute limiter keyed by caller identity (§6 "API keys
/// carry ... a rate-limit tier, optional custom per-minute/per-hour/burst
/// limits"). A production multi-node deployment would back this with a
/// shared store; a single process is the scope this gateway targets.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

struct Window {
    started_at: Instant,
    count: u32,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { windows: DashMap::new() }
    }

    /// Returns `true` if the call is allowed, bumping the caller's count.
    pub fn check(&self, key: &str, tier: RateLimitTier, custom: Option<RateLimits>) -> bool {
        let limit = custom.and_then(|l| l.per_minute).unwrap_or_else(|| default_per_minute(tier));
        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window { started_at: Instant::now(), count: 0 });

        if entry.started_at.elapsed() >= Duration::from_secs(60) {
            entry.started_at = Instant::now();
            entry.count = 0;
        }

        if entry.count >= limit {
            return false;
        }
        entry.count += 1;
        true
    }
}

fn default_per_minute(tier: RateLimitTier) -> u32 {
    match tier {
        RateLimitTier::Standard => 60,
        RateLimitTier::Elevated => 300,
        RateLimitTier::System => 6000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tier_blocks_after_its_default_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..60 {
            assert!(limiter.check("u1", RateLimitTier::Standard, None));
        }
        assert!(!limiter.check("u1", RateLimitTier::Standard, None));
    }

    #[test]
    fn custom_limit_overrides_the_tier_default() {
        let limiter = RateLimiter::new();
        let custom = RateLimits { per_minute: Some(2), per_hour: None, burst: None };
        assert!(limiter.check("u2", RateLimitTier::Standard, Some(custom)));
        assert!(limiter.check("u2", RateLimitTier::Standard, Some(custom)));
        assert!(!limiter.check("u2", RateLimitTier::Standard, Some(custom)));
    }

    #[test]
    fn distinct_keys_are_independent() {
        let limiter = RateLimiter::new();
        let custom = RateLimits { per_minute: Some(1), per_hour: None, burst: None };
        assert!(limiter.check("a", RateLimitTier::Standard, Some(custom)));
        assert!(limiter.check("b", RateLimitTier::Standard, Some(custom)));
    }
}
