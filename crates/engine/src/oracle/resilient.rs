//! Resilient oracle wrapper with exponential backoff retry
//!
//! Wraps any DecisionOracle implementation with retry logic to ride out
//! transient provider failures.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use howl_domain::Decision;

use super::{DecisionOracle, DecisionRequest, OracleError};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Base delay in milliseconds before first retry
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) for randomizing delays to prevent thundering herd
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            max_delay_ms: 15000,
            jitter_factor: 0.2,
        }
    }
}

/// Wrapper that adds retry logic to any decision oracle
pub struct ResilientOracle {
    inner: Arc<dyn DecisionOracle>,
    config: RetryConfig,
}

impl ResilientOracle {
    pub fn new(inner: Arc<dyn DecisionOracle>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Calculate delay for a given attempt number using exponential backoff with jitter
    fn calculate_delay(&self, attempt: u32) -> u64 {
        let base = self.config.base_delay_ms;
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.config.max_delay_ms);

        let jitter_range = (capped as f64 * self.config.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }

    /// Determine if an error is retryable
    fn is_retryable(error: &OracleError) -> bool {
        match error {
            OracleError::Timeout => true,
            // Auth and bad-request failures won't improve on retry
            OracleError::Provider(msg) => {
                !msg.contains("401") && !msg.contains("403") && !msg.contains("400")
            }
            // A malformed reply may be a one-off sampling accident
            OracleError::Malformed(_) => true,
        }
    }
}

#[async_trait]
impl DecisionOracle for ResilientOracle {
    async fn decide(&self, request: DecisionRequest) -> Result<Decision, OracleError> {
        let mut last_error = OracleError::Provider("no attempt made".to_string());

        for attempt in 0..=self.config.max_retries {
            match self.inner.decide(request.clone()).await {
                Ok(decision) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            player = %request.player,
                            schema = request.schema.label(),
                            "decision request succeeded after retry"
                        );
                    }
                    return Ok(decision);
                }
                Err(e) => {
                    let retryable = Self::is_retryable(&e);
                    if attempt < self.config.max_retries && retryable {
                        let delay = self.calculate_delay(attempt + 1);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            delay_ms = delay,
                            error = %e,
                            player = %request.player,
                            "decision request failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        last_error = e;
                    } else {
                        if !retryable {
                            tracing::error!(
                                error = %e,
                                player = %request.player,
                                "decision request failed with non-retryable error"
                            );
                        }
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use howl_domain::{BaseDecision, DecisionSchema};

    use super::*;

    struct FlakyOracle {
        calls: AtomicU32,
        succeed_after: u32,
    }

    #[async_trait]
    impl DecisionOracle for FlakyOracle {
        async fn decide(&self, _request: DecisionRequest) -> Result<Decision, OracleError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.succeed_after {
                Err(OracleError::Timeout)
            } else {
                Ok(Decision::Statement(BaseDecision::default()))
            }
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter_factor: 0.0,
        }
    }

    fn request() -> DecisionRequest {
        DecisionRequest::new("Player1", "speak", "", DecisionSchema::Statement)
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let inner = Arc::new(FlakyOracle {
            calls: AtomicU32::new(0),
            succeed_after: 2,
        });
        let oracle = ResilientOracle::new(inner.clone(), fast_config(3));
        let result = oracle.decide(request()).await;
        assert!(result.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = Arc::new(FlakyOracle {
            calls: AtomicU32::new(0),
            succeed_after: 10,
        });
        let oracle = ResilientOracle::new(inner.clone(), fast_config(2));
        let result = oracle.decide(request()).await;
        assert!(matches!(result, Err(OracleError::Timeout)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        struct AuthFail;
        #[async_trait]
        impl DecisionOracle for AuthFail {
            async fn decide(&self, _request: DecisionRequest) -> Result<Decision, OracleError> {
                Err(OracleError::Provider("401 unauthorized".to_string()))
            }
        }
        let oracle = ResilientOracle::new(Arc::new(AuthFail), fast_config(5));
        let result = oracle.decide(request()).await;
        assert!(matches!(result, Err(OracleError::Provider(_))));
    }
}
