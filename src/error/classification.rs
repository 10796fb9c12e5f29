//! Error classification types for the retry system
//!
//! This module provides the closed vocabularies used to describe a failure
//! (category, severity, recovery strategy) and the [`ErrorContext`] value a
//! classification produces. The recovery strategy carries the retry delay
//! table, so callers can decide whether and how long to wait without knowing
//! which pattern matched.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The broad kind of failure an error message describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Connectivity problems: refused connections, DNS, sockets, TLS.
    Network,
    /// A locator did not resolve, or resolved ambiguously.
    ElementNotFound,
    /// A previously resolved element is detached from the page.
    StaleElement,
    /// An operation ran out of time.
    Timeout,
    /// Credentials were rejected.
    Authentication,
    /// A backend answered with an error status.
    ApiError,
    /// The browser, page or context crashed or closed.
    BrowserError,
    /// A test expectation did not hold.
    AssertionError,
    /// Test data was missing or malformed.
    DataError,
    /// The environment the suite runs in is misconfigured.
    Environment,
    /// Nothing in the pattern table matched.
    Unknown,
}

impl ErrorCategory {
    /// Returns the wire name of the category (`NETWORK`, `ELEMENT_NOT_FOUND`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::ElementNotFound => "ELEMENT_NOT_FOUND",
            ErrorCategory::StaleElement => "STALE_ELEMENT",
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::Authentication => "AUTHENTICATION",
            ErrorCategory::ApiError => "API_ERROR",
            ErrorCategory::BrowserError => "BROWSER_ERROR",
            ErrorCategory::AssertionError => "ASSERTION_ERROR",
            ErrorCategory::DataError => "DATA_ERROR",
            ErrorCategory::Environment => "ENVIRONMENT",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much impact a failure has, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Returns the wire name of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The policy that decides whether and how a failed operation is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    /// Do not retry; surface the error right away.
    FailFast,
    /// Retry without waiting.
    RetryImmediate,
    /// Retry after a linearly growing wait (1s, 2s, 3s, ...).
    RetryWithWait,
    /// Retry after an exponentially growing wait (1s, 2s, 4s, ...).
    RetryWithBackoff,
    /// Retry after a longer linear wait (2s, 4s, 6s, ...) to give slow
    /// operations more room.
    RetryWithIncreasedTimeout,
    /// The session must be torn down; no in-place retry delay applies.
    RestartSession,
}

impl RecoveryStrategy {
    /// All strategies, in declaration order.
    pub const ALL: [RecoveryStrategy; 6] = [
        RecoveryStrategy::FailFast,
        RecoveryStrategy::RetryImmediate,
        RecoveryStrategy::RetryWithWait,
        RecoveryStrategy::RetryWithBackoff,
        RecoveryStrategy::RetryWithIncreasedTimeout,
        RecoveryStrategy::RestartSession,
    ];

    /// Returns the wire name of the strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::FailFast => "FAIL_FAST",
            RecoveryStrategy::RetryImmediate => "RETRY_IMMEDIATE",
            RecoveryStrategy::RetryWithWait => "RETRY_WITH_WAIT",
            RecoveryStrategy::RetryWithBackoff => "RETRY_WITH_BACKOFF",
            RecoveryStrategy::RetryWithIncreasedTimeout => "RETRY_WITH_INCREASED_TIMEOUT",
            RecoveryStrategy::RestartSession => "RESTART_SESSION",
        }
    }

    /// Returns true unless the strategy is [`RecoveryStrategy::FailFast`].
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RecoveryStrategy::FailFast)
    }

    /// Calculates the wait before the next attempt.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    /// Returns `None` when the strategy prescribes no in-place retry delay
    /// (`FAIL_FAST`, `RESTART_SESSION`). Growth is not capped; arithmetic
    /// saturates instead of overflowing.
    pub fn retry_delay(&self, attempt: u32) -> Option<Duration> {
        let exponent = attempt.saturating_sub(1);
        let attempt = u64::from(attempt);
        let millis = match self {
            RecoveryStrategy::RetryImmediate => 0,
            RecoveryStrategy::RetryWithWait => 1000u64.saturating_mul(attempt),
            RecoveryStrategy::RetryWithBackoff => {
                1000u64.saturating_mul(2u64.saturating_pow(exponent))
            }
            RecoveryStrategy::RetryWithIncreasedTimeout => 2000u64.saturating_mul(attempt),
            RecoveryStrategy::FailFast | RecoveryStrategy::RestartSession => return None,
        };
        Some(Duration::from_millis(millis))
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecoveryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        RecoveryStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| format!("unknown recovery strategy: {}", s))
    }
}

/// The result of classifying one error.
///
/// A fresh context is built on every classification and never mutated
/// afterwards. Two contexts for the same message differ only in `timestamp`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorContext {
    /// The category of the error.
    pub category: ErrorCategory,
    /// How severe the error is.
    pub severity: Severity,
    /// The message that was classified.
    pub message: String,
    /// Human-readable remediation hint.
    pub suggestion: String,
    /// How the failed operation should be recovered.
    pub recovery_strategy: RecoveryStrategy,
    /// `Debug` rendering of the error value, when one was classified
    /// instead of a bare message.
    pub original_error: Option<String>,
    /// When the classification happened.
    pub timestamp: DateTime<Utc>,
}

impl ErrorContext {
    /// Creates a context stamped with the current time.
    pub fn new(
        category: ErrorCategory,
        severity: Severity,
        message: impl Into<String>,
        suggestion: impl Into<String>,
        recovery_strategy: RecoveryStrategy,
    ) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            suggestion: suggestion.into(),
            recovery_strategy,
            original_error: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches the rendering of the original error value.
    pub fn with_original_error(mut self, original: impl Into<String>) -> Self {
        self.original_error = Some(original.into());
        self
    }

    /// Returns true if the error may be retried.
    pub fn is_retryable(&self) -> bool {
        self.recovery_strategy.is_retryable()
    }

    /// Returns the wait before retrying after the given 1-based attempt.
    pub fn retry_delay(&self, attempt: u32) -> Option<Duration> {
        self.recovery_strategy.retry_delay(attempt)
    }

    /// Compares everything a classification decides, ignoring the message
    /// payload and timestamp.
    pub fn same_classification(&self, other: &ErrorContext) -> bool {
        self.category == other.category
            && self.severity == other.severity
            && self.suggestion == other.suggestion
            && self.recovery_strategy == other.recovery_strategy
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {} ({})",
            self.category, self.severity, self.message, self.suggestion
        )
    }
}

/// Returns true unless the context's recovery strategy is `FAIL_FAST`.
pub fn is_retryable(context: &ErrorContext) -> bool {
    context.is_retryable()
}

/// Returns the retry delay for `context` after the given 1-based attempt,
/// or `None` when the context must not be retried in place.
pub fn retry_delay(context: &ErrorContext, attempt: u32) -> Option<Duration> {
    context.retry_delay(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(strategy: RecoveryStrategy) -> ErrorContext {
        ErrorContext::new(
            ErrorCategory::Unknown,
            Severity::Medium,
            "boom",
            "check logs",
            strategy,
        )
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_category_display_uses_wire_names() {
        assert_eq!(ErrorCategory::ElementNotFound.to_string(), "ELEMENT_NOT_FOUND");
        assert_eq!(ErrorCategory::ApiError.to_string(), "API_ERROR");
        assert_eq!(ErrorCategory::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&RecoveryStrategy::RetryWithIncreasedTimeout).unwrap();
        assert_eq!(json, "\"RETRY_WITH_INCREASED_TIMEOUT\"");

        let parsed: ErrorCategory = serde_json::from_str("\"BROWSER_ERROR\"").unwrap();
        assert_eq!(parsed, ErrorCategory::BrowserError);
    }

    #[test]
    fn test_strategy_from_str_accepts_loose_spelling() {
        assert_eq!(
            "retry-with-backoff".parse::<RecoveryStrategy>().unwrap(),
            RecoveryStrategy::RetryWithBackoff
        );
        assert_eq!(
            "FAIL_FAST".parse::<RecoveryStrategy>().unwrap(),
            RecoveryStrategy::FailFast
        );
        assert!("sometimes".parse::<RecoveryStrategy>().is_err());
    }

    #[test]
    fn test_only_fail_fast_is_not_retryable() {
        for strategy in RecoveryStrategy::ALL {
            let expected = strategy != RecoveryStrategy::FailFast;
            assert_eq!(is_retryable(&context(strategy)), expected, "{}", strategy);
        }
    }

    #[test]
    fn test_retry_immediate_has_zero_delay() {
        let ctx = context(RecoveryStrategy::RetryImmediate);
        assert_eq!(retry_delay(&ctx, 1), Some(Duration::ZERO));
        assert_eq!(retry_delay(&ctx, 5), Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_with_wait_is_linear() {
        let ctx = context(RecoveryStrategy::RetryWithWait);
        assert_eq!(retry_delay(&ctx, 1), Some(Duration::from_secs(1)));
        assert_eq!(retry_delay(&ctx, 2), Some(Duration::from_secs(2)));
        assert_eq!(retry_delay(&ctx, 3), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_retry_with_backoff_is_exponential() {
        let ctx = context(RecoveryStrategy::RetryWithBackoff);
        assert_eq!(retry_delay(&ctx, 1), Some(Duration::from_secs(1)));
        assert_eq!(retry_delay(&ctx, 2), Some(Duration::from_secs(2)));
        assert_eq!(retry_delay(&ctx, 3), Some(Duration::from_secs(4)));
        assert_eq!(retry_delay(&ctx, 4), Some(Duration::from_secs(8)));
    }

    #[test]
    fn test_retry_with_backoff_saturates() {
        let ctx = context(RecoveryStrategy::RetryWithBackoff);
        assert_eq!(retry_delay(&ctx, 200), Some(Duration::from_millis(u64::MAX)));
    }

    #[test]
    fn test_increased_timeout_doubles_the_linear_step() {
        let ctx = context(RecoveryStrategy::RetryWithIncreasedTimeout);
        assert_eq!(retry_delay(&ctx, 1), Some(Duration::from_secs(2)));
        assert_eq!(retry_delay(&ctx, 3), Some(Duration::from_secs(6)));
    }

    #[test]
    fn test_no_delay_for_fail_fast_or_restart() {
        for attempt in [1, 2, 10, 1000] {
            assert_eq!(retry_delay(&context(RecoveryStrategy::FailFast), attempt), None);
            assert_eq!(
                retry_delay(&context(RecoveryStrategy::RestartSession), attempt),
                None
            );
        }
    }

    #[test]
    fn test_with_original_error() {
        let ctx = context(RecoveryStrategy::FailFast).with_original_error("Custom { kind: Other }");
        assert_eq!(ctx.original_error.as_deref(), Some("Custom { kind: Other }"));
    }

    #[test]
    fn test_same_classification_ignores_timestamp() {
        let first = context(RecoveryStrategy::RetryWithWait);
        let mut second = first.clone();
        second.timestamp = first.timestamp + chrono::Duration::seconds(5);

        assert_ne!(first, second);
        assert!(first.same_classification(&second));
    }

    #[test]
    fn test_context_display() {
        let ctx = context(RecoveryStrategy::FailFast);
        assert_eq!(ctx.to_string(), "[UNKNOWN/MEDIUM] boom (check logs)");
    }
}
