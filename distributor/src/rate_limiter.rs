//! Per-tenant ingestion rate limiting (§4.3.3): a token bucket keyed by
//! tenant, refilled continuously and checked before a batch is admitted.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStrategy {
    /// Each distributor enforces `rate_limit_bytes`/s independently.
    Local,
    /// `rate_limit_bytes`/s is split evenly across `live_distributors`.
    Global,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub rate_limit_bytes: u64,
    pub burst_size_bytes: u64,
    pub strategy: RateLimitStrategy,
    pub live_distributors: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rate_limit_bytes: 15_000_000,
            burst_size_bytes: 20_000_000,
            strategy: RateLimitStrategy::Local,
            live_distributors: 1,
        }
    }
}

impl RateLimiterConfig {
    fn refill_rate_bytes_per_sec(&self) -> f64 {
        match self.strategy {
            RateLimitStrategy::Local => self.rate_limit_bytes as f64,
            RateLimitStrategy::Global => self.rate_limit_bytes as f64 / self.live_distributors.max(1) as f64,
        }
    }
}

struct TokenBucket {
    available: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(burst: f64) -> Self {
        Self { available: burst, last_refill: Instant::now() }
    }

    fn refill(&mut self, rate_per_sec: f64, burst: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.available = (self.available + elapsed * rate_per_sec).min(burst);
        self.last_refill = now;
    }
}

/// A token bucket per tenant, created lazily and filled to capacity on first
/// use so a tenant's opening burst is never throttled by its own absence.
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self { config, buckets: Mutex::new(HashMap::new()) }
    }

    /// Admits a batch of `size` bytes for `tenant`, consuming tokens on
    /// success (§4.3.3). `size` larger than the burst capacity can never be
    /// admitted regardless of bucket state and is rejected up front.
    pub fn check(&self, tenant: &str, size: u64) -> Result<()> {
        let burst = self.config.burst_size_bytes;
        if size > burst {
            return Err(Error::ExceedsBurst {
                tenant: tenant.to_string(),
                local_limit: self.config.rate_limit_bytes,
                global_limit: self.config.refill_rate_bytes_per_sec() as u64,
                burst,
                added: size,
            });
        }

        let rate = self.config.refill_rate_bytes_per_sec();
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(tenant.to_string()).or_insert_with(|| TokenBucket::new(burst as f64));
        bucket.refill(rate, burst as f64);

        if bucket.available < size as f64 {
            return Err(Error::RateLimited { tenant: tenant.to_string(), added: size, available: bucket.available as u64 });
        }

        bucket.available -= size as f64;
        Ok(())
    }

    /// Tokens currently available for `tenant`, after applying refill.
    /// Exposed for tests and diagnostics; not part of the admission path.
    pub fn available(&self, tenant: &str) -> u64 {
        let rate = self.config.refill_rate_bytes_per_sec();
        let burst = self.config.burst_size_bytes as f64;
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(tenant.to_string()).or_insert_with(|| TokenBucket::new(burst));
        bucket.refill(rate, burst);
        bucket.available as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(rate: u64, burst: u64) -> RateLimiterConfig {
        RateLimiterConfig { rate_limit_bytes: rate, burst_size_bytes: burst, strategy: RateLimitStrategy::Local, live_distributors: 1 }
    }

    #[test]
    fn burst_within_capacity_of_an_empty_bucket_succeeds() {
        let limiter = RateLimiter::new(local(100, 1000));
        assert!(limiter.check("t", 400).is_ok());
        assert!(limiter.check("t", 600).is_ok());
    }

    #[test]
    fn exact_burst_size_succeeds_even_with_a_low_refill_rate() {
        let limiter = RateLimiter::new(local(1, 1000));
        assert!(limiter.check("t", 1000).is_ok());
    }

    #[test]
    fn one_byte_over_burst_is_rejected_regardless_of_bucket_state() {
        let limiter = RateLimiter::new(local(1_000_000, 1000));
        let err = limiter.check("t", 1001).unwrap_err();
        assert!(matches!(err, Error::ExceedsBurst { .. }));
    }

    #[test]
    fn exhausted_bucket_rejects_further_requests_until_refilled() {
        let limiter = RateLimiter::new(local(10, 100));
        assert!(limiter.check("t", 100).is_ok());
        let err = limiter.check("t", 1).unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[test]
    fn tenants_are_isolated() {
        let limiter = RateLimiter::new(local(10, 100));
        assert!(limiter.check("a", 100).is_ok());
        assert!(limiter.check("b", 100).is_ok());
    }

    #[test]
    fn global_strategy_splits_refill_across_live_distributors() {
        let config = RateLimiterConfig {
            rate_limit_bytes: 100,
            burst_size_bytes: 100,
            strategy: RateLimitStrategy::Global,
            live_distributors: 4,
        };
        assert_eq!(config.refill_rate_bytes_per_sec(), 25.0);
    }
}
