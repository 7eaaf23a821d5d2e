// Fetcher variants for each listing source. New sources implement the
// trait; the orchestrator never needs to know which kind it is driving.

pub mod indeed;
pub mod jsearch;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{RawListing, SearchTask, Source};

pub use indeed::IndeedFetcher;
pub use jsearch::JSearchFetcher;

/// One listing source. A fetch call executes the whole task (all pages up
/// to `max_results`) and returns the raw captures in page order. Calls are
/// not resumable; a fresh call re-runs the query.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self, task: &SearchTask) -> Result<Vec<RawListing>, FetchError>;
}

/// Bounded retry with exponential backoff, shared by both fetcher
/// variants. Non-retryable errors (auth failures, bad requests) surface
/// immediately; transient ones are retried up to `max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut last = None;
        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        %label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch attempt failed, backing off"
                    );
                    last = Some(e);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.max_attempts,
            last: last
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
