use std::collections::HashMap;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use nonzero_ext::nonzero;

use crate::models::Source;

/// Per-source request pacing. Each source gets an independent limiter
/// enforcing a minimum interval between requests, with random jitter on
/// top to avoid correlated bursts. Acquisition only ever delays; it
/// cannot fail.
pub struct SourceRateLimiter {
    limiters: HashMap<Source, DefaultDirectRateLimiter>,
    jitter: Duration,
}

impl SourceRateLimiter {
    pub fn new(min_interval: Duration, jitter: Duration) -> Self {
        let quota = Quota::with_period(min_interval).unwrap_or(Quota::per_second(nonzero!(1u32)));
        let limiters = Source::ALL
            .iter()
            .map(|&source| (source, RateLimiter::direct(quota)))
            .collect();
        Self { limiters, jitter }
    }

    /// Blocks until the next request to `source` is within policy.
    pub async fn acquire(&self, source: Source) {
        let Some(limiter) = self.limiters.get(&source) else {
            return;
        };
        if self.jitter.is_zero() {
            limiter.until_ready().await;
        } else {
            limiter.until_ready_with_jitter(Jitter::up_to(self.jitter)).await;
        }
    }
}
