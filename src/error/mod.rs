//! Error classification module
//!
//! This module maps raw failure messages from end-to-end test runs to a
//! structured [`ErrorContext`]: a category, a severity, a remediation hint and
//! the recovery strategy that decides whether and how to retry.

pub mod classification;
pub mod detector;

// Re-export main types for convenient access
pub use classification::{
    is_retryable, retry_delay, ErrorCategory, ErrorContext, RecoveryStrategy, Severity,
};
pub use detector::{
    classify, classify_error, ErrorClassifier, ErrorPattern, PatternError, UNKNOWN_SUGGESTION,
};
