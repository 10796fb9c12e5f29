//! flakeguard - error classification and retries for end-to-end test suites
//!
//! Failures coming out of browser automation and API checks are mapped to a
//! category, severity and recovery strategy by an ordered table of regular
//! expressions. The retry executor uses that classification to decide whether
//! to try again and how long to wait, and always hands back the operation's
//! own error when it gives up.

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

pub use error::{
    classify, classify_error, is_retryable, retry_delay, ErrorCategory, ErrorClassifier,
    ErrorContext, RecoveryStrategy, Severity,
};
pub use retry::{sleep, wait_for, wait_until, with_retry, Retry, RetryOptions, WaitOptions};
