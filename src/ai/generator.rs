//! Generation Client
//!
//! The cache-then-compute decorator every provider composes with: one
//! `generate` call is a cache lookup keyed by the request fingerprint, with
//! the provider's `raw_generate` (wrapped in retry) as the compute function.
//! Caching logic lives here once, not per provider.
//!
//! Retry policy: retryable errors back off exponentially with jitter, up to
//! a bounded attempt count, honoring server-suggested delays; fatal errors
//! surface immediately with no retry. The loop only distinguishes the two
//! abstract outcomes — it knows nothing about any backend.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::cache::{CacheManager, fingerprint};
use super::prompt::PromptEnvelope;
use super::provider::{ProviderResponse, SamplingParams, SharedProvider};
use crate::constants::retry as retry_constants;
use crate::types::{CvError, Result};

/// Bounded exponential backoff settings.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first attempt included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Cap on the delay between attempts
    pub max_delay: Duration,
    /// Multiplier applied after each attempt
    pub backoff_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry_constants::MAX_ATTEMPTS,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
            backoff_factor: retry_constants::BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Policy without sleeps, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }
}

/// Provider client composing the response cache with retry.
pub struct Generator {
    provider: SharedProvider,
    cache: Arc<CacheManager>,
    params: SamplingParams,
    ttl: Duration,
    retry: RetryPolicy,
}

impl Generator {
    pub fn new(
        provider: SharedProvider,
        cache: Arc<CacheManager>,
        params: SamplingParams,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            params,
            ttl,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Generate a response for the envelope, consulting the cache first.
    ///
    /// Concurrent calls with the same fingerprint collapse to a single
    /// upstream request (see `CacheManager`).
    pub async fn generate(&self, envelope: &PromptEnvelope) -> Result<ProviderResponse> {
        let key = fingerprint(
            self.provider.name(),
            self.provider.model(),
            envelope,
            &self.params,
        );
        self.cache
            .get_or_compute(&key, self.ttl, move || self.call_with_retry(envelope))
            .await
    }

    /// Check whether the underlying backend is reachable.
    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await
    }

    async fn call_with_retry(&self, envelope: &PromptEnvelope) -> Result<ProviderResponse> {
        let mut delay = self.retry.base_delay;

        for attempt in 1..=self.retry.max_attempts {
            match self.provider.raw_generate(envelope, self.params).await {
                Ok(response) => {
                    debug!(
                        provider = self.provider.name(),
                        attempt, "generation succeeded"
                    );
                    return Ok(response);
                }
                Err(err) if !err.is_retryable() => {
                    warn!(provider = self.provider.name(), error = %err, "fatal provider error");
                    return Err(err.into());
                }
                Err(err) => {
                    if attempt == self.retry.max_attempts {
                        return Err(CvError::ProviderExhausted {
                            provider: self.provider.name().to_string(),
                            model: self.provider.model().to_string(),
                            attempts: attempt,
                            message: err.message().to_string(),
                        });
                    }

                    let wait = err.retry_after().unwrap_or(delay);
                    let wait = wait + jitter(wait);
                    info!(
                        provider = self.provider.name(),
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "transient provider error, backing off"
                    );
                    sleep(wait).await;
                    delay = next_backoff(delay, self.retry.backoff_factor, self.retry.max_delay);
                }
            }
        }

        // max_attempts >= 1 is validated by config; the loop always returns.
        Err(CvError::ProviderExhausted {
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
            attempts: self.retry.max_attempts,
            message: "no attempts were made".to_string(),
        })
    }
}

/// Random jitter up to a quarter of the base delay.
fn jitter(base: Duration) -> Duration {
    let max_jitter_ms = (base.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_jitter_ms))
}

/// Exponential backoff with cap.
fn next_backoff(current: Duration, factor: f32, max: Duration) -> Duration {
    let next = Duration::from_secs_f32(current.as_secs_f32() * factor);
    std::cmp::min(next, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::ai::prompt::PromptBuilder;
    use crate::ai::provider::ModelProvider;
    use crate::storage::SqliteStore;
    use crate::types::{Period, PeriodSummary, ProviderError};

    /// Stub that fails with a retryable error a fixed number of times, then
    /// succeeds, counting every raw call.
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
        fatal: bool,
    }

    impl FlakyProvider {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                fatal: false,
            }
        }

        fn fatal() -> Self {
            Self {
                failures: u32::MAX,
                calls: AtomicU32::new(0),
                fatal: true,
            }
        }
    }

    #[async_trait]
    impl ModelProvider for FlakyProvider {
        async fn raw_generate(
            &self,
            _envelope: &PromptEnvelope,
            _params: SamplingParams,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.fatal {
                    return Err(ProviderError::fatal("stub", "invalid api key"));
                }
                return Err(ProviderError::retryable("stub", "rate limited"));
            }
            Ok(ProviderResponse {
                text: "ok".to_string(),
                provider: "stub".to_string(),
                model: "stub-model".to_string(),
                usage: Default::default(),
            })
        }

        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn envelope() -> PromptEnvelope {
        let builder = PromptBuilder::new("english", "third").unwrap();
        builder.monthly_narrative(&PeriodSummary::empty(Period::month_of(
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )))
    }

    fn generator(provider: Arc<FlakyProvider>, max_attempts: u32) -> Generator {
        let cache = Arc::new(CacheManager::new(Arc::new(
            SqliteStore::open_in_memory().unwrap(),
        )));
        Generator::new(
            provider,
            cache,
            SamplingParams::default(),
            Duration::from_secs(60),
        )
        .with_retry(RetryPolicy::immediate(max_attempts))
    }

    // k retryable failures (k < max attempts) then success: k+1 raw calls.
    #[tokio::test]
    async fn test_retryable_failures_then_success() {
        let provider = Arc::new(FlakyProvider::failing(2));
        let generator = generator(Arc::clone(&provider), 4);

        let response = generator.generate(&envelope()).await.unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    // Always-retryable failures exhaust the configured attempts.
    #[tokio::test]
    async fn test_retry_exhaustion() {
        let provider = Arc::new(FlakyProvider::failing(u32::MAX));
        let generator = generator(Arc::clone(&provider), 3);

        let err = generator.generate(&envelope()).await.unwrap_err();
        match err {
            CvError::ProviderExhausted {
                provider: name,
                model,
                attempts,
                ..
            } => {
                assert_eq!(name, "stub");
                assert_eq!(model, "stub-model");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected ProviderExhausted, got {:?}", other),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    // Fatal errors surface immediately: exactly one raw call.
    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let provider = Arc::new(FlakyProvider::fatal());
        let generator = generator(Arc::clone(&provider), 4);

        let err = generator.generate(&envelope()).await.unwrap_err();
        assert!(matches!(err, CvError::Provider(ProviderError::Fatal { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    // Byte-identical envelope + provider + model: at most one raw call.
    #[tokio::test]
    async fn test_identical_requests_hit_cache() {
        let provider = Arc::new(FlakyProvider::failing(0));
        let generator = generator(Arc::clone(&provider), 4);

        let first = generator.generate(&envelope()).await.unwrap();
        let second = generator.generate(&envelope()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_next_backoff_caps() {
        let next = next_backoff(Duration::from_millis(500), 2.0, Duration::from_secs(30));
        assert_eq!(next, Duration::from_secs(1));

        let capped = next_backoff(Duration::from_secs(25), 2.0, Duration::from_secs(30));
        assert_eq!(capped, Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(1000);
        for _ in 0..32 {
            assert!(jitter(base) <= Duration::from_millis(250));
        }
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }
}
