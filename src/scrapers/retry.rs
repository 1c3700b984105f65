//! Bounded-retry wrapper around a source fetch.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Result, ScrapeError};
use crate::models::{Deal, SearchCriteria};
use crate::registry::SourceFetcher;

/// Fetch with bounded retries, growing timeouts and jittered backoff.
///
/// Attempt `i` (0-indexed) gets `base_timeout + i * increment`; attempts
/// after the first are preceded by a randomized backoff sleep so a flaky
/// site is not hammered in lockstep by every client. Attempts are
/// independent: no partial result crosses from one to the next. After
/// `max_retries` failures the last error is returned and the caller decides
/// whether to fall back.
pub async fn fetch_with_retry(
    source_name: &str,
    fetcher: &dyn SourceFetcher,
    criteria: &SearchCriteria,
    config: &RetryConfig,
) -> Result<Vec<Deal>> {
    let mut last_error = None;

    for attempt in 0..config.max_retries {
        if attempt > 0 {
            let backoff_ms = {
                let mut rng = rand::rng();
                rng.random_range(config.backoff_min_ms..=config.backoff_max_ms.max(config.backoff_min_ms))
            };
            debug!(source = source_name, attempt, backoff_ms, "retrying after backoff");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }

        let timeout = config.attempt_timeout(attempt);
        match tokio::time::timeout(timeout, fetcher.fetch(criteria)).await {
            Ok(Ok(deals)) => {
                debug!(source = source_name, attempt, count = deals.len(), "fetch succeeded");
                return Ok(deals);
            }
            Ok(Err(e)) => {
                warn!(source = source_name, attempt, error = %e, "fetch attempt failed");
                last_error = Some(e);
            }
            Err(_) => {
                warn!(
                    source = source_name,
                    attempt,
                    timeout_ms = timeout.as_millis() as u64,
                    "fetch attempt timed out"
                );
                last_error = Some(ScrapeError::SourceFetch {
                    source_name: source_name.to_string(),
                    message: format!("timed out after {:?}", timeout),
                });
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ScrapeError::SourceFetch {
        source_name: source_name.to_string(),
        message: "no attempts were made".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::models::test_support::deal;
    use crate::models::{DealDuration, Region};

    /// Fails `failures` times, then succeeds.
    struct FlakyFetcher {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SourceFetcher for FlakyFetcher {
        async fn fetch(&self, _criteria: &SearchCriteria) -> Result<Vec<Deal>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ScrapeError::SourceFetch {
                    source_name: "flaky".to_string(),
                    message: "transient".to_string(),
                })
            } else {
                Ok(vec![deal("Flaky", 9.99, Region::Global, DealDuration::OneMonth)])
            }
        }
    }

    struct SlowFetcher;

    #[async_trait]
    impl SourceFetcher for SlowFetcher {
        async fn fetch(&self, _criteria: &SearchCriteria) -> Result<Vec<Deal>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_timeout_ms: 200,
            increment_ms: 50,
            backoff_min_ms: 1,
            backoff_max_ms: 2,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher { failures: 2, calls: calls.clone() };

        let deals = fetch_with_retry("flaky", &fetcher, &SearchCriteria::default(), &fast_retry(3))
            .await
            .unwrap();

        assert_eq!(deals.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_makes_exactly_max_retries_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FlakyFetcher { failures: u32::MAX, calls: calls.clone() };

        let result =
            fetch_with_retry("flaky", &fetcher, &SearchCriteria::default(), &fast_retry(3)).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn slow_attempt_hits_per_attempt_timeout() {
        let result =
            fetch_with_retry("slow", &SlowFetcher, &SearchCriteria::default(), &fast_retry(2)).await;

        match result {
            Err(ScrapeError::SourceFetch { message, .. }) => {
                assert!(message.contains("timed out"));
            }
            other => panic!("expected timeout error, got {:?}", other.map(|d| d.len())),
        }
    }
}
