//! Retry execution module.
//!
//! This module runs fallible async operations with bounded retries. Every
//! failure is classified with an [`ErrorClassifier`]; the resulting recovery
//! strategy decides whether another attempt is made and how long to wait
//! before it. The operation's own error is always what the caller gets back.

pub mod wait;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ErrorClassifier, ErrorContext};

// Re-export wait utilities for convenient access
pub use wait::{sleep, wait_for, wait_until, WaitError, WaitOptions};

/// Default number of attempts, including the first one.
pub const MAX_ATTEMPTS: u32 = 3;

/// Default base delay for the fallback backoff formula, in milliseconds.
pub const DELAY_MS: u64 = 1000;

/// Default multiplier for the fallback backoff formula.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type RetryObserver<E> = Arc<dyn Fn(&E, u32) + Send + Sync>;

/// Configuration for one retry session.
///
/// `delay` and `backoff_multiplier` only apply when the classified recovery
/// strategy prescribes no delay of its own (for example when `retry_on`
/// forces a retry of a `FAIL_FAST` error).
pub struct RetryOptions<E> {
    /// Maximum number of attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    /// Base delay for the fallback backoff formula.
    pub delay: Duration,
    /// Multiplier for the fallback backoff formula.
    pub backoff_multiplier: f64,
    retry_on: Option<RetryPredicate<E>>,
    on_retry: Option<RetryObserver<E>>,
    cancel: Option<CancellationToken>,
    classifier: Option<Arc<ErrorClassifier>>,
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: Duration::from_millis(DELAY_MS),
            backoff_multiplier: BACKOFF_MULTIPLIER,
            retry_on: None,
            on_retry: None,
            cancel: None,
            classifier: None,
        }
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            delay: self.delay,
            backoff_multiplier: self.backoff_multiplier,
            retry_on: self.retry_on.clone(),
            on_retry: self.on_retry.clone(),
            cancel: self.cancel.clone(),
            classifier: self.classifier.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("retry_on", &self.retry_on.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("cancel", &self.cancel.is_some())
            .field("classifier", &self.classifier.is_some())
            .finish()
    }
}

impl<E> RetryOptions<E> {
    /// Creates options with the default attempt count and delays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the base delay of the fallback backoff formula.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the multiplier of the fallback backoff formula.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Overrides the classification-based retry decision.
    pub fn with_retry_on<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Some(Arc::new(predicate));
        self
    }

    /// Registers a callback invoked with the error and the 1-based attempt
    /// number before each wait. Never called for the failure that is
    /// finally returned, except when cancellation fires during the wait that
    /// follows the callback.
    pub fn with_on_retry<C>(mut self, callback: C) -> Self
    where
        C: Fn(&E, u32) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Stops retrying once `token` is cancelled. The in-flight attempt is
    /// never interrupted; the last error is returned instead of retrying.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Classifies failures with `classifier` instead of the built-in table.
    pub fn with_classifier(mut self, classifier: Arc<ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Returns the classifier used for this session.
    pub fn classifier(&self) -> &ErrorClassifier {
        match &self.classifier {
            Some(classifier) => classifier,
            None => ErrorClassifier::shared(),
        }
    }

    /// Calculates the fallback delay: `delay * backoff_multiplier^(attempt - 1)`.
    pub fn fallback_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        if !millis.is_finite() || millis <= 0.0 {
            return if millis.is_infinite() {
                Duration::from_millis(u64::MAX)
            } else {
                Duration::ZERO
            };
        }
        Duration::from_millis(millis.min(u64::MAX as f64) as u64)
    }

    /// Resolves the wait after a failed attempt: the strategy's own delay
    /// when it has one, otherwise the fallback formula.
    pub fn delay_for(&self, context: &ErrorContext, attempt: u32) -> Duration {
        context
            .retry_delay(attempt)
            .unwrap_or_else(|| self.fallback_delay(attempt))
    }

    fn should_retry(&self, error: &E, context: &ErrorContext) -> bool {
        match &self.retry_on {
            Some(predicate) => predicate(error),
            None => context.is_retryable(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Waits `delay`, returning false if cancellation fired first.
    async fn pause(&self, delay: Duration) -> bool {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => false,
                    _ = sleep(delay) => true,
                }
            }
            None => {
                sleep(delay).await;
                true
            }
        }
    }
}

/// Executes `operation` with retries governed by classification.
///
/// Each failure is classified by its `Display` message. The session stops
/// and returns the failure when it is not retryable (per `retry_on` when
/// supplied, per the recovery strategy otherwise), when `max_attempts` is
/// reached, or when the cancellation token fires. One warning is logged per
/// retried failure and one error for the failure that is returned.
///
/// # Examples
///
/// ```no_run
/// use flakeguard::retry::{with_retry, RetryOptions};
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let options = RetryOptions::new().with_max_attempts(5);
/// let body = with_retry(|| async { fetch_page().await }, &options).await?;
/// # Ok(())
/// # }
/// # async fn fetch_page() -> Result<String, std::io::Error> { Ok(String::new()) }
/// ```
pub async fn with_retry<T, E, F, Fut>(mut operation: F, options: &RetryOptions<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt: u32 = 1;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let message = error.to_string();
        let context = options.classifier().classify(&message);

        if !options.should_retry(&error, &context) || attempt >= max_attempts {
            tracing::error!(
                attempts = attempt,
                error = %message,
                category = %context.category,
                suggestion = %context.suggestion,
                "Operation failed after {} attempts",
                attempt
            );
            return Err(error);
        }

        if options.is_cancelled() {
            tracing::error!(
                attempts = attempt,
                error = %message,
                category = %context.category,
                "Retry cancelled after {} attempts",
                attempt
            );
            return Err(error);
        }

        let delay = options.delay_for(&context, attempt);
        tracing::warn!(
            attempt,
            max_attempts,
            error = %message,
            category = %context.category,
            delay_ms = delay.as_millis() as u64,
            "Retry attempt {}/{}",
            attempt,
            max_attempts
        );

        if let Some(callback) = &options.on_retry {
            callback(&error, attempt);
        }

        // A token that fires during the wait ends the session after on_retry
        // has already run for this failure.
        let resumed = delay.is_zero() || options.pause(delay).await;

        if !resumed {
            tracing::error!(
                attempts = attempt,
                error = %message,
                category = %context.category,
                "Retry cancelled after {} attempts",
                attempt
            );
            return Err(error);
        }

        attempt += 1;
    }
}

/// Reusable retry policy: the counterpart of a retry decorator.
///
/// A `Retry` holds one set of options and applies them either to a single
/// operation ([`Retry::run`]) or to a callable taking arguments
/// ([`Retry::wrap`]).
pub struct Retry<E> {
    options: RetryOptions<E>,
}

impl<E> Clone for Retry<E> {
    fn clone(&self) -> Self {
        Self::new(self.options.clone())
    }
}

impl<E> fmt::Debug for Retry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry").field("options", &self.options).finish()
    }
}

impl<E> Default for Retry<E> {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}

impl<E> Retry<E> {
    /// Creates a retry policy from options.
    pub fn new(options: RetryOptions<E>) -> Self {
        Self { options }
    }

    /// Returns the options this policy applies.
    pub fn options(&self) -> &RetryOptions<E> {
        &self.options
    }

    /// Runs `operation` under this policy. Same contract as [`with_retry`].
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        with_retry(operation, &self.options).await
    }

    /// Wraps `function` so that every call is retried under this policy.
    pub fn wrap<F>(self, function: F) -> Retrying<F, E> {
        Retrying {
            function,
            retry: self,
        }
    }
}

/// A callable wrapped by [`Retry::wrap`].
pub struct Retrying<F, E> {
    function: F,
    retry: Retry<E>,
}

impl<F, E> Retrying<F, E> {
    /// Calls the wrapped function with `args`, retrying failures. Each
    /// attempt receives its own clone of `args`.
    pub async fn call<A, T, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        A: Clone,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.retry
            .run(|| (self.function)(args.clone()))
            .await
    }

    /// Returns the policy applied to every call.
    pub fn policy(&self) -> &Retry<E> {
        &self.retry
    }
}
