//! Polling and sleeping helpers.
//!
//! These are plain poll-until utilities, not retry logic: a condition is
//! checked on a fixed interval until it holds or the timeout elapses, and an
//! elapsed timeout is always reported as [`WaitError::TimeoutExceeded`].

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Default time to wait for a condition.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default interval between condition checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors returned by the wait helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The condition did not hold before the timeout elapsed.
    #[error("Condition not met within {}ms", .timeout.as_millis())]
    TimeoutExceeded { timeout: Duration },
}

/// Timing for [`wait_for`] and [`wait_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// How long to keep polling.
    pub timeout: Duration,
    /// Pause between two checks.
    pub interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitOptions {
    /// Creates options with the default timeout and interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the polling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Suspends the current task for `duration` without blocking other tasks.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Polls an async `condition` until it returns true.
///
/// The condition is checked immediately, then once per `interval` while less
/// than `timeout` has elapsed.
///
/// # Errors
/// Returns [`WaitError::TimeoutExceeded`] if the condition never held.
pub async fn wait_for<C, Fut>(mut condition: C, options: WaitOptions) -> Result<(), WaitError>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();

    while started.elapsed() < options.timeout {
        if condition().await {
            return Ok(());
        }
        sleep(options.interval).await;
    }

    tracing::debug!(
        timeout_ms = options.timeout.as_millis() as u64,
        "Condition not met before timeout"
    );
    Err(WaitError::TimeoutExceeded {
        timeout: options.timeout,
    })
}

/// Polls a synchronous `condition` until it returns true.
///
/// Same contract as [`wait_for`].
pub async fn wait_until<C>(mut condition: C, options: WaitOptions) -> Result<(), WaitError>
where
    C: FnMut() -> bool,
{
    wait_for(move || std::future::ready(condition()), options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_wait_options_defaults() {
        let options = WaitOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.interval, Duration::from_millis(100));
        assert_eq!(WaitOptions::new(), options);
    }

    #[test]
    fn test_wait_options_builder() {
        let options = WaitOptions::new()
            .with_timeout(Duration::from_millis(200))
            .with_interval(Duration::from_millis(50));
        assert_eq!(options.timeout, Duration::from_millis(200));
        assert_eq!(options.interval, Duration::from_millis(50));
    }

    #[test]
    fn test_timeout_error_message() {
        let error = WaitError::TimeoutExceeded {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(error.to_string(), "Condition not met within 250ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_advances_clock() {
        let started = Instant::now();
        sleep(Duration::from_millis(150)).await;
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_true_returns_immediately() {
        let started = Instant::now();
        wait_until(|| true, WaitOptions::default()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_times_out() {
        let options = WaitOptions::new()
            .with_timeout(Duration::from_millis(200))
            .with_interval(Duration::from_millis(50));

        let started = Instant::now();
        let result = wait_until(|| false, options).await;
        let elapsed = started.elapsed();

        assert_eq!(
            result,
            Err(WaitError::TimeoutExceeded {
                timeout: Duration::from_millis(200)
            })
        );
        assert!(elapsed >= Duration::from_millis(200), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(250), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_async_condition() {
        let checks = AtomicU32::new(0);
        let options = WaitOptions::new().with_interval(Duration::from_millis(10));

        wait_for(
            || async { checks.fetch_add(1, Ordering::SeqCst) + 1 >= 3 },
            options,
        )
        .await
        .unwrap();

        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }
}
