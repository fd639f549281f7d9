//! Retry logic with exponential backoff and jitter.

use crate::{CrossSeedError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Add jitter to prevent thundering herd.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Configuration for quick retries (indexer/arr API calls).
    pub fn quick() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Configuration for slow retries (torrent downloads, client injection).
    pub fn slow() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Determines which errors should be retried.
#[derive(Debug, Clone, Copy)]
pub enum RetryPolicy {
    /// Retry all errors.
    All,
    /// Retry only transient errors (network, timeout, 5xx, etc).
    Transient,
    /// Never retry.
    Never,
}

/// Execute an async operation with retry logic.
pub async fn retry_with_backoff<F, Fut, T>(
    config: RetryConfig,
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        debug!(
            "attempting {} (attempt {}/{})",
            operation_name, attempt, config.max_attempts
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(err) => {
                if !should_retry(&err, policy) {
                    debug!("{} failed with non-retryable error: {}", operation_name, err);
                    return Err(err);
                }

                if attempt >= config.max_attempts {
                    error!(
                        "{} failed after {} attempts: {}",
                        operation_name, config.max_attempts, err
                    );
                    return Err(CrossSeedError::RetryExhausted {
                        operation: operation_name.to_string(),
                        attempts: config.max_attempts,
                        last_error: Box::new(err),
                    });
                }

                warn!(
                    "{} failed on attempt {}/{}: {}. retrying in {:?}",
                    operation_name, attempt, config.max_attempts, err, delay
                );

                sleep(delay).await;
                delay = calculate_next_delay(delay, &config);
            }
        }
    }
}

fn should_retry(error: &CrossSeedError, policy: RetryPolicy) -> bool {
    match policy {
        RetryPolicy::Never => false,
        RetryPolicy::All => true,
        RetryPolicy::Transient => matches!(
            error,
            CrossSeedError::Network(_)
                | CrossSeedError::Timeout { .. }
                | CrossSeedError::TransientIndexerError { .. }
                | CrossSeedError::ClientError { .. }
        ),
    }
}

fn calculate_next_delay(current: Duration, config: &RetryConfig) -> Duration {
    let mut next = current.mul_f64(config.backoff_multiplier);

    if next > config.max_delay {
        next = config.max_delay;
    }

    if config.jitter {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let jitter_factor = rng.gen_range(0.5..1.5);
        next = next.mul_f64(jitter_factor);
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_second_attempt() {
        let attempt = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            ..Default::default()
        };

        let attempt_clone = attempt.clone();
        let result = retry_with_backoff(config, RetryPolicy::All, "test_operation", move || {
            let attempt = attempt_clone.clone();
            async move {
                let current = attempt.fetch_add(1, Ordering::SeqCst) + 1;
                if current == 2 {
                    Ok(42)
                } else {
                    Err(CrossSeedError::candidate("simulated failure"))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn exhausts_attempts() {
        let config = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(5),
            ..Default::default()
        };

        let result: Result<()> =
            retry_with_backoff(config, RetryPolicy::All, "test_operation", || async {
                Err(CrossSeedError::candidate("always fails"))
            })
            .await;

        assert!(matches!(result, Err(CrossSeedError::RetryExhausted { .. })));
    }

    #[test]
    fn non_transient_errors_are_not_retried_under_transient_policy() {
        let err = CrossSeedError::configuration("bad config");
        assert!(!should_retry(&err, RetryPolicy::Transient));
    }
}
