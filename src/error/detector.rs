//! Pattern-based error classifier for end-to-end test failures
//!
//! This module provides regex-based matching that maps raw error messages from
//! browser automation and API calls to an [`ErrorContext`]. Patterns are
//! evaluated in order and the first match wins, so more specific patterns must
//! come before general ones that overlap with them.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

use super::{ErrorCategory, ErrorContext, RecoveryStrategy, Severity};

/// Suggestion attached to messages that no pattern recognises.
pub const UNKNOWN_SUGGESTION: &str = "Unknown error - check logs for details";

/// Errors raised while building a custom pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The pattern is not a valid regular expression.
    #[error("invalid error pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A rule mapping matching messages to a classification.
#[derive(Debug, Clone)]
pub struct ErrorPattern {
    /// The compiled, case-insensitive regex.
    regex: Regex,
    /// The category assigned on match.
    category: ErrorCategory,
    /// The severity assigned on match.
    severity: Severity,
    /// Remediation hint for this kind of failure.
    suggestion: String,
    /// How a failure of this kind is recovered.
    recovery_strategy: RecoveryStrategy,
}

impl ErrorPattern {
    /// Creates a pattern from a regex source, matched case-insensitively.
    ///
    /// # Errors
    /// Returns [`PatternError::InvalidRegex`] if the pattern does not compile.
    pub fn new(
        pattern: &str,
        category: ErrorCategory,
        severity: Severity,
        suggestion: impl Into<String>,
        recovery_strategy: RecoveryStrategy,
    ) -> Result<Self, PatternError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self::with_regex(
            regex,
            category,
            severity,
            suggestion,
            recovery_strategy,
        ))
    }

    /// Creates a pattern with a pre-compiled regex. Case sensitivity is
    /// whatever the regex was built with.
    pub fn with_regex(
        regex: Regex,
        category: ErrorCategory,
        severity: Severity,
        suggestion: impl Into<String>,
        recovery_strategy: RecoveryStrategy,
    ) -> Self {
        Self {
            regex,
            category,
            severity,
            suggestion: suggestion.into(),
            recovery_strategy,
        }
    }

    /// Returns the regex pattern.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Returns the error category.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the suggestion.
    pub fn suggestion(&self) -> &str {
        &self.suggestion
    }

    /// Returns the recovery strategy.
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        self.recovery_strategy
    }

    /// Checks if this pattern matches the given text.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    fn to_context(&self, message: &str) -> ErrorContext {
        ErrorContext::new(
            self.category,
            self.severity,
            message,
            self.suggestion.clone(),
            self.recovery_strategy,
        )
    }
}

/// Classifies error messages against an ordered list of patterns.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    /// The patterns to match against, in priority order.
    patterns: Vec<ErrorPattern>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_CLASSIFIER: Lazy<ErrorClassifier> = Lazy::new(ErrorClassifier::new);

impl ErrorClassifier {
    /// Creates a classifier with the built-in pattern table.
    pub fn new() -> Self {
        Self {
            patterns: Self::default_patterns(),
        }
    }

    /// Creates a classifier with custom patterns only.
    pub fn with_patterns(patterns: Vec<ErrorPattern>) -> Self {
        Self { patterns }
    }

    /// Returns the shared classifier holding the built-in table.
    pub fn shared() -> &'static ErrorClassifier {
        &DEFAULT_CLASSIFIER
    }

    /// Returns the built-in patterns in evaluation order.
    ///
    /// Timeout comes first: messages such as "network timeout exceeded" must
    /// not fall through to the broader network rule below it.
    pub fn default_patterns() -> Vec<ErrorPattern> {
        let table: [(&str, ErrorCategory, Severity, &str, RecoveryStrategy); 9] = [
            (
                r"timeout.*(exceeded|expired|waiting)|timed out|waiting.*timeout|network.*timeout|timeout.*network",
                ErrorCategory::Timeout,
                Severity::Medium,
                "Operation timed out - increase timeout or check performance",
                RecoveryStrategy::RetryWithIncreasedTimeout,
            ),
            (
                r"connection|connect|network|socket|dns|host.*(refused|failed|error)",
                ErrorCategory::Network,
                Severity::High,
                "Check network connectivity and server availability",
                RecoveryStrategy::RetryWithBackoff,
            ),
            (
                r"ssl|tls|certificate|handshake.*(error|failed|invalid)",
                ErrorCategory::Network,
                Severity::High,
                "SSL/TLS certificate issue - check certificate validity",
                RecoveryStrategy::FailFast,
            ),
            (
                r"element|locator|selector.*(not found|not visible|not present|could not)",
                ErrorCategory::ElementNotFound,
                Severity::Medium,
                "Element not found - check locators and page load state",
                RecoveryStrategy::RetryWithWait,
            ),
            (
                r"strict mode violation|resolved to \d+ elements",
                ErrorCategory::ElementNotFound,
                Severity::Medium,
                "Multiple elements matched - use more specific locator",
                RecoveryStrategy::FailFast,
            ),
            (
                r"(401|403|unauthorized|forbidden|access denied|authentication).*(failed|error|invalid)",
                ErrorCategory::Authentication,
                Severity::High,
                "Authentication failed - verify credentials",
                RecoveryStrategy::FailFast,
            ),
            (
                r"(api|rest|http).*(error|failed|500|502|503|504)",
                ErrorCategory::ApiError,
                Severity::High,
                "API error - check server status and request payload",
                RecoveryStrategy::RetryWithBackoff,
            ),
            (
                r"browser|page.*(crash|closed|context)",
                ErrorCategory::BrowserError,
                Severity::Critical,
                "Browser crashed or closed - restart browser context",
                RecoveryStrategy::RestartSession,
            ),
            (
                r"expect|assert|should|mismatch",
                ErrorCategory::AssertionError,
                Severity::Low,
                "Assertion failed - verify expected vs actual values",
                RecoveryStrategy::FailFast,
            ),
        ];

        table
            .into_iter()
            .map(|(pattern, category, severity, suggestion, strategy)| {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("built-in error pattern must compile");
                ErrorPattern::with_regex(regex, category, severity, suggestion, strategy)
            })
            .collect()
    }

    /// Appends a pattern; it is evaluated after all existing ones.
    pub fn add_pattern(&mut self, pattern: ErrorPattern) {
        self.patterns.push(pattern);
    }

    /// Inserts a pattern ahead of all existing ones.
    pub fn prepend_pattern(&mut self, pattern: ErrorPattern) {
        self.patterns.insert(0, pattern);
    }

    /// Returns the number of patterns configured.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Returns a reference to all configured patterns.
    pub fn patterns(&self) -> &[ErrorPattern] {
        &self.patterns
    }

    /// Classifies an error message.
    ///
    /// Returns the context of the first matching pattern, or an `UNKNOWN`
    /// context (medium severity, retry with backoff) when nothing matches.
    /// Never fails; empty messages are classified as unknown.
    pub fn classify(&self, message: &str) -> ErrorContext {
        self.patterns
            .iter()
            .find(|pattern| pattern.matches(message))
            .map(|pattern| pattern.to_context(message))
            .unwrap_or_else(|| {
                ErrorContext::new(
                    ErrorCategory::Unknown,
                    Severity::Medium,
                    message,
                    UNKNOWN_SUGGESTION,
                    RecoveryStrategy::RetryWithBackoff,
                )
            })
    }

    /// Classifies an error value by its `Display` message and records its
    /// `Debug` rendering as the original error.
    pub fn classify_error<E>(&self, error: &E) -> ErrorContext
    where
        E: std::error::Error + ?Sized,
    {
        self.classify(&error.to_string())
            .with_original_error(format!("{:?}", error))
    }
}

/// Classifies a message with the built-in pattern table.
pub fn classify(message: &str) -> ErrorContext {
    ErrorClassifier::shared().classify(message)
}

/// Classifies an error value with the built-in pattern table.
pub fn classify_error<E>(error: &E) -> ErrorContext
where
    E: std::error::Error + ?Sized,
{
    ErrorClassifier::shared().classify_error(error)
}
