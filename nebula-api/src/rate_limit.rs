//! Per-caller rate limiting, grounded on the teacher's token-bucket
//! middleware idiom but backed by `governor` instead of a hand-rolled
//! counter, keyed by API-key prefix (or `"anon"` pre-auth) via `dashmap` so
//! concurrent requests for different callers never serialize on one lock.

use governor::{Quota, RateLimiter as GovernorLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;

const ONE: NonZeroU32 = match NonZeroU32::new(1) {
    Some(v) => v,
    None => unreachable!(),
};

type Bucket = GovernorLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct RateLimiter {
    unauthenticated_quota: Quota,
    authenticated_quota: Quota,
    buckets: DashMap<String, Arc<Bucket>>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(
        unauthenticated_per_min: u32,
        authenticated_per_min: u32,
        burst: u32,
        enabled: bool,
    ) -> Self {
        let burst = NonZeroU32::new(burst).unwrap_or(ONE);
        Self {
            unauthenticated_quota: Quota::per_minute(
                NonZeroU32::new(unauthenticated_per_min).unwrap_or(ONE),
            )
            .allow_burst(burst),
            authenticated_quota: Quota::per_minute(
                NonZeroU32::new(authenticated_per_min).unwrap_or(ONE),
            )
            .allow_burst(burst),
            buckets: DashMap::new(),
            enabled,
        }
    }

    /// Returns `false` when `key` has exceeded its quota. `authenticated`
    /// selects which quota applies; `key` should be the API key's 8-char
    /// prefix for authenticated callers, or the remote address for
    /// unauthenticated ones.
    pub fn check(&self, key: &str, authenticated: bool) -> bool {
        if !self.enabled {
            return true;
        }
        let quota = if authenticated {
            self.authenticated_quota
        } else {
            self.unauthenticated_quota
        };
        let bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(GovernorLimiter::direct(quota)))
            .clone();
        bucket.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_limiter_always_passes() {
        let limiter = RateLimiter::new(1, 1, 1, false);
        for _ in 0..10 {
            assert!(limiter.check("k", false));
        }
    }

    #[test]
    fn exhausts_then_blocks() {
        let limiter = RateLimiter::new(1, 1, 1, true);
        assert!(limiter.check("k", false));
        assert!(!limiter.check("k", false));
    }

    #[test]
    fn distinct_keys_have_independent_buckets() {
        let limiter = RateLimiter::new(1, 1, 1, true);
        assert!(limiter.check("a", false));
        assert!(limiter.check("b", false));
    }
}
