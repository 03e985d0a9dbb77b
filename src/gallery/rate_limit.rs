//! Outbound request limiting for the token API, backed by governor.
//!
//! Every GraphQL request waits for a permit before it is sent, so the
//! bounded wallet concurrency never turns into a burst of page requests.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Request limiter shared by all fetches of one pipeline.
pub struct RequestLimiter {
    /// Underlying governor rate limiter
    limiter: DefaultDirectRateLimiter,
    /// Configured requests per second
    quota: u32,
    /// Permits handed out
    requests: AtomicU64,
    /// Responses that reported rate limiting
    rate_limited: AtomicU64,
}

impl RequestLimiter {
    /// Create a limiter allowing `requests_per_second` (minimum 1).
    pub fn new(requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            quota: per_second.get(),
            requests: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
        }
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!("Request quota exhausted, waiting for permit");
            self.limiter.until_ready().await;
        }
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rate-limited response from the remote service.
    pub fn record_rate_limited(&self) {
        let count = self.rate_limited.fetch_add(1, Ordering::Relaxed) + 1;
        warn!("Token API rate limited ({} times so far)", count);
    }

    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            quota: self.quota,
            total_requests: self.requests.load(Ordering::Relaxed),
            rate_limited_responses: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

/// Rate limiting statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStats {
    pub quota: u32,
    pub total_requests: u64,
    pub rate_limited_responses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_quota_clamped() {
        let limiter = RequestLimiter::new(0);
        assert_eq!(limiter.stats().quota, 1);
    }

    #[tokio::test]
    async fn test_acquire_counts_requests() {
        let limiter = RequestLimiter::new(100);

        for _ in 0..3 {
            limiter.acquire().await;
        }
        limiter.record_rate_limited();

        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.rate_limited_responses, 1);
    }
}
