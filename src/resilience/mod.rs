//! Wraps an external-service call with a timeout, retry-with-backoff,
//! and circuit breaker, composed outer-to-inner as breaker -> retry ->
//! timeout.

pub mod circuit_breaker;

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

use crate::error::ResolverError;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before the given zero-indexed retry attempt, per
    /// `min(maxDelay, initialDelay * backoffMultiplier^attempt)`, plus
    /// up to 20% jitter when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.backoff_multiplier.powi(attempt as i32);
        let base_ms = (self.initial_delay.as_millis() as f64 * exp).min(self.max_delay.as_millis() as f64);
        let jittered_ms = if self.jitter {
            let jitter_fraction = rand::rng().random_range(0.0..0.2);
            base_ms * (1.0 + jitter_fraction)
        } else {
            base_ms
        };
        Duration::from_millis(jittered_ms.min(self.max_delay.as_millis() as f64) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Whether an error is worth retrying. Timeouts and network failures
/// are transient; everything else (validation, conflicts) is not.
pub fn is_retryable(error: &ResolverError) -> bool {
    matches!(
        error.kind(),
        crate::error::ErrorKind::ServiceTimeout | crate::error::ErrorKind::ServiceNetwork
    )
}

/// Runs `operation` under the breaker/retry/timeout stack for `service`.
/// `operation` is called once per attempt and must be re-entrant.
pub async fn call<F, Fut, T>(service: &str, breaker: &CircuitBreaker, config: &ResilienceConfig, mut operation: F) -> Result<T, ResolverError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ResolverError>>,
{
    if !breaker.allow().await {
        return Err(ResolverError::ServiceUnavailable { service: service.to_string() });
    }

    let mut last_err: Option<ResolverError> = None;

    for attempt in 0..config.retry.max_attempts {
        if attempt > 0 {
            tokio::time::sleep(config.retry.delay_for(attempt - 1)).await;
        }

        let result = tokio::time::timeout(config.timeout, operation()).await;

        match result {
            Ok(Ok(value)) => {
                breaker.record_success().await;
                return Ok(value);
            }
            Ok(Err(err)) => {
                let retryable = is_retryable(&err);
                last_err = Some(err);
                if !retryable {
                    breaker.record_failure().await;
                    return Err(last_err.unwrap());
                }
            }
            Err(_elapsed) => {
                last_err = Some(ResolverError::ServiceTimeout {
                    service: service.to_string(),
                    elapsed_ms: config.timeout.as_millis() as u64,
                });
            }
        }
    }

    breaker.record_failure().await;
    Err(last_err.unwrap_or_else(|| ResolverError::ServiceUnavailable { service: service.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn instant_retry_config() -> ResilienceConfig {
        ResilienceConfig {
            timeout: Duration::from_millis(50),
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 1.0,
                jitter: false,
            },
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let config = instant_retry_config();
        let attempts = Arc::new(AtomicU32::new(0));

        let result = call("svc", &breaker, &config, || {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ResolverError::ServiceNetwork {
                        service: "svc".to_string(),
                        message: "connection reset".to_string(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_fast() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let config = instant_retry_config();
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<(), ResolverError> = call("svc", &breaker, &config, || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ResolverError::validation("bad input"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_breaker_rejects_without_calling_operation() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });
        breaker.record_failure().await;
        let config = instant_retry_config();
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<(), ResolverError> = call("svc", &breaker, &config, || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(ResolverError::ServiceUnavailable { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn delay_grows_by_backoff_multiplier() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(config.delay_for(0), Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(200));
        assert_eq!(config.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(config.delay_for(5), Duration::from_millis(300));
    }
}
