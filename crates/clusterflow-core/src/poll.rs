//! Poll and retry primitives
//!
//! "Wait until target state reached" operations are modeled as
//! poll-with-timeout loops with a fixed interval and a maximum elapsed
//! bound, returning a typed outcome instead of silently continuing.

use crate::error::ProbeError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Poll loop parameters
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed interval between condition evaluations
    pub interval: Duration,

    /// Maximum elapsed time before the loop gives up
    pub max_elapsed: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(300),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, max_elapsed: Duration) -> Self {
        Self {
            interval,
            max_elapsed,
        }
    }
}

/// Typed outcome of a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The condition became true within the bound
    Satisfied,
    /// The bound elapsed first
    TimedOut,
    /// Cancellation was requested
    Cancelled,
}

/// Evaluate `condition` at a fixed interval until it returns true, the
/// maximum elapsed bound is exceeded, or cancellation is requested.
///
/// A condition that errors internally should return false and let the
/// next tick retry; the loop itself never fails.
pub async fn poll_until<F, Fut>(
    config: &PollConfig,
    what: &str,
    cancel: &Arc<AtomicBool>,
    mut condition: F,
) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let started = Instant::now();

    loop {
        if cancel.load(Ordering::SeqCst) {
            tracing::info!(wait = %what, "Poll cancelled");
            return PollOutcome::Cancelled;
        }

        if condition().await {
            tracing::debug!(wait = %what, elapsed_ms = started.elapsed().as_millis() as u64, "Poll satisfied");
            return PollOutcome::Satisfied;
        }

        if started.elapsed() + config.interval > config.max_elapsed {
            tracing::warn!(
                wait = %what,
                max_elapsed_s = config.max_elapsed.as_secs(),
                "Poll timed out"
            );
            return PollOutcome::TimedOut;
        }

        sleep(config.interval).await;
    }
}

/// Retry parameters for transient probe failures: bounded attempt count
/// with a fixed backoff between attempts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Run a probe operation, retrying transient failures up to the bounded
/// count before surfacing the last [`ProbeError`].
pub async fn retry_probe<F, Fut, T>(
    config: &RetryConfig,
    what: &str,
    mut operation: F,
) -> Result<T, ProbeError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProbeError>>,
{
    let mut last_err = None;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < config.max_attempts {
                    tracing::warn!(
                        probe = %what,
                        attempt,
                        error = %e,
                        delay_ms = config.delay.as_millis() as u64,
                        "Probe failed, retrying"
                    );
                    sleep(config.delay).await;
                } else {
                    tracing::warn!(probe = %what, attempt, error = %e, "Probe failed, retries exhausted");
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ProbeError::new(what, "no attempts made")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn no_cancel() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    fn fast_poll() -> PollConfig {
        PollConfig::new(Duration::from_millis(1), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_poll_satisfied_immediately() {
        let outcome = poll_until(&fast_poll(), "ready", &no_cancel(), || async { true }).await;
        assert_eq!(outcome, PollOutcome::Satisfied);
    }

    #[tokio::test]
    async fn test_poll_satisfied_after_ticks() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let outcome = poll_until(&fast_poll(), "ready", &no_cancel(), || {
            let c = c.clone();
            async move { c.fetch_add(1, Ordering::SeqCst) >= 2 }
        })
        .await;

        assert_eq!(outcome, PollOutcome::Satisfied);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let outcome = poll_until(&fast_poll(), "never", &no_cancel(), || async { false }).await;
        assert_eq!(outcome, PollOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_poll_cancelled() {
        let cancel = Arc::new(AtomicBool::new(true));
        let outcome = poll_until(&fast_poll(), "x", &cancel, || async { true }).await;
        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let config = RetryConfig {
            max_attempts: 5,
            delay: Duration::from_millis(1),
        };

        let result = retry_probe(&config, "api", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProbeError::new("api", "connection refused"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let config = RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        };

        let result: Result<u32, ProbeError> = retry_probe(&config, "api", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ProbeError::new("api", "down"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
