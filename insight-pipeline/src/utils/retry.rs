//! Timeout and retry policy for external capability calls
//!
//! Every analysis and synthesis call goes through [`call_with_retry`]: each
//! attempt is bounded by `call_timeout`, failures back off exponentially
//! (`initial_backoff` doubling, capped at `max_backoff`) until `max_attempts`
//! is spent.

use insight_common::config::RetrySettings;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1` (attempt is 1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            call_timeout: Duration::from_millis(settings.call_timeout_ms),
        }
    }
}

/// Budget spent without a successful attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: String,
    /// Last attempt ended by timeout rather than an error
    pub timed_out: bool,
}

impl std::fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} after {} attempts", self.last_error, self.attempts)
    }
}

/// Run `operation` under the policy's timeout, retrying failures
///
/// `retryable` decides whether an error is worth another attempt; timeouts
/// are always retried.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g. "analyze", "synthesize")
/// * `item_id` - Document id or theme id, for logging
pub async fn call_with_retry<F, Fut, T, E, R>(
    operation_name: &str,
    item_id: &str,
    policy: &RetryPolicy,
    retryable: R,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let (last_error, timed_out, retry) =
            match tokio::time::timeout(policy.call_timeout, operation()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = operation_name,
                            item = item_id,
                            attempt,
                            "Call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    let retry = retryable(&e);
                    (e.to_string(), false, retry)
                }
                Err(_) => (
                    format!("timed out after {} ms", policy.call_timeout.as_millis()),
                    true,
                    true,
                ),
            };

        if !retry || attempt >= policy.max_attempts {
            tracing::warn!(
                operation = operation_name,
                item = item_id,
                attempt,
                error = %last_error,
                "Call failed, retry budget exhausted"
            );
            return Err(RetryExhausted {
                attempts: attempt,
                last_error,
                timed_out,
            });
        }

        let backoff = policy.backoff_after(attempt);
        tracing::debug!(
            operation = operation_name,
            item = item_id,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %last_error,
            "Call failed, retrying after backoff"
        );
        tokio::time::sleep(backoff).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            call_timeout: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            call_timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(300));
        assert_eq!(policy.backoff_after(10), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_errors() {
        let attempts = AtomicU32::new(0);
        let result = call_with_retry("op", "doc_000", &fast_policy(), |_: &String| true, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("transient {}", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_timeouts_exhaust_budget() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), RetryExhausted> =
            call_with_retry("op", "doc_001", &fast_policy(), |_: &String| true, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<(), String>(())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.timed_out);
        assert_eq!(err.attempts, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), RetryExhausted> =
            call_with_retry("op", "theme_001", &fast_policy(), |_: &String| false, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), String>("structural".to_string()) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(!err.timed_out);
        assert_eq!(err.last_error, "structural");
    }
}
