//! Configuration for retry sessions, waits and custom error patterns.
//!
//! Settings are read from a TOML file with environment variable overrides.
//! Every section is optional; a missing section keeps the built-in defaults.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{
    ErrorCategory, ErrorClassifier, ErrorPattern, PatternError, RecoveryStrategy, Severity,
};
use crate::retry::{RetryOptions, WaitOptions, BACKOFF_MULTIPLIER, DELAY_MS, MAX_ATTEMPTS};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "FLAKEGUARD";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// A custom error pattern does not compile.
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

/// Retry session settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetrySettings {
    /// Maximum number of attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay of the fallback backoff formula, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Multiplier of the fallback backoff formula.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay_ms: DELAY_MS,
            backoff_multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}

fn default_delay_ms() -> u64 {
    DELAY_MS
}

fn default_backoff_multiplier() -> f64 {
    BACKOFF_MULTIPLIER
}

impl RetrySettings {
    /// Builds retry options carrying these settings.
    pub fn to_options<E>(&self) -> RetryOptions<E> {
        RetryOptions::new()
            .with_max_attempts(self.max_attempts)
            .with_delay(Duration::from_millis(self.delay_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
    }
}

/// Polling settings for the wait helpers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WaitSettings {
    /// How long to keep polling, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause between two checks, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_interval_ms() -> u64 {
    100
}

impl WaitSettings {
    /// Builds wait options carrying these settings.
    pub fn to_options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_interval(Duration::from_millis(self.interval_ms))
    }
}

/// A user-defined classification rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PatternSpec {
    /// Regex source, matched case-insensitively.
    pub pattern: String,
    /// Category assigned on match.
    pub category: ErrorCategory,
    /// Severity assigned on match.
    pub severity: Severity,
    /// Remediation hint.
    pub suggestion: String,
    /// How matching failures are recovered.
    pub recovery_strategy: RecoveryStrategy,
}

impl PatternSpec {
    /// Compiles the rule.
    pub fn compile(&self) -> Result<ErrorPattern, PatternError> {
        ErrorPattern::new(
            &self.pattern,
            self.category,
            self.severity,
            self.suggestion.clone(),
            self.recovery_strategy,
        )
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ResilienceConfig {
    /// Retry session settings
    #[serde(default)]
    pub retry: RetrySettings,
    /// Wait helper settings
    #[serde(default)]
    pub wait: WaitSettings,
    /// Extra classification rules, checked before the built-in table
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
}

impl ResilienceConfig {
    /// Load configuration from a file path.
    ///
    /// Environment variables override file values using the format
    /// `FLAKEGUARD__<SECTION>__<KEY>` (e.g. `FLAKEGUARD__RETRY__MAX_ATTEMPTS=5`).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration file does not exist
    /// - The configuration file cannot be parsed
    /// - The path is invalid
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flakeguard::config::ResilienceConfig;
    ///
    /// let config = ResilienceConfig::load("flakeguard.toml")?;
    /// # Ok::<(), flakeguard::config::ConfigError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path_str.to_string()));
        }

        let config = Config::builder()
            .add_source(File::with_name(path_str))
            .add_source(Self::environment())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder().add_source(Self::environment()).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    /// Builds a classifier with the configured rules ahead of the built-in
    /// table, in file order.
    pub fn classifier(&self) -> Result<ErrorClassifier, ConfigError> {
        let mut patterns = self
            .patterns
            .iter()
            .map(PatternSpec::compile)
            .collect::<Result<Vec<_>, _>>()?;
        patterns.extend(ErrorClassifier::default_patterns());
        Ok(ErrorClassifier::with_patterns(patterns))
    }

    /// Builds retry options from the retry section and the configured
    /// classifier.
    pub fn retry_options<E>(&self) -> Result<RetryOptions<E>, ConfigError> {
        let options = self.retry.to_options();
        if self.patterns.is_empty() {
            return Ok(options);
        }
        Ok(options.with_classifier(Arc::new(self.classifier()?)))
    }

    /// Builds wait options from the wait section.
    pub fn wait_options(&self) -> WaitOptions {
        self.wait.to_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL_CONFIG: &str = r#"
        [retry]
        max_attempts = 5
        delay_ms = 250
        backoff_multiplier = 1.5

        [wait]
        timeout_ms = 2000
        interval_ms = 20

        [[patterns]]
        pattern = "stale element"
        category = "STALE_ELEMENT"
        severity = "MEDIUM"
        suggestion = "Re-query the element before interacting"
        recovery_strategy = "RETRY_IMMEDIATE"
    "#;

    #[test]
    fn test_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 1000);
        assert_eq!(config.retry.backoff_multiplier, 2.0);
        assert_eq!(config.wait.timeout_ms, 10_000);
        assert_eq!(config.wait.interval_ms, 100);
        assert!(config.patterns.is_empty());
    }

    #[test]
    fn test_from_toml_str_full() {
        let config = ResilienceConfig::from_toml_str(FULL_CONFIG).unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay_ms, 250);
        assert_eq!(config.retry.backoff_multiplier, 1.5);
        assert_eq!(config.wait.timeout_ms, 2000);
        assert_eq!(config.wait.interval_ms, 20);
        assert_eq!(config.patterns.len(), 1);
        assert_eq!(config.patterns[0].category, ErrorCategory::StaleElement);
        assert_eq!(
            config.patterns[0].recovery_strategy,
            RecoveryStrategy::RetryImmediate
        );
    }

    #[test]
    fn test_from_toml_str_partial_keeps_defaults() {
        let config = ResilienceConfig::from_toml_str("[retry]\nmax_attempts = 7\n").unwrap();
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.delay_ms, 1000);
        assert_eq!(config.wait, WaitSettings::default());
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_category() {
        let source = r#"
            [[patterns]]
            pattern = "x"
            category = "GREMLINS"
            severity = "LOW"
            suggestion = "n/a"
            recovery_strategy = "FAIL_FAST"
        "#;
        let result = ResilienceConfig::from_toml_str(source);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ResilienceConfig::load("/definitely/not/here/flakeguard.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = ResilienceConfig::load(file.path()).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.patterns.len(), 1);
    }

    #[test]
    fn test_classifier_puts_custom_rules_first() {
        let config = ResilienceConfig::from_toml_str(FULL_CONFIG).unwrap();
        let classifier = config.classifier().unwrap();

        assert_eq!(
            classifier.pattern_count(),
            ErrorClassifier::default_patterns().len() + 1
        );
        let context = classifier.classify("stale element reference: element is not attached");
        assert_eq!(context.category, ErrorCategory::StaleElement);
        assert_eq!(
            classifier.classify("Connection refused").category,
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_classifier_reports_bad_regex() {
        let config = ResilienceConfig {
            patterns: vec![PatternSpec {
                pattern: "([".to_string(),
                category: ErrorCategory::DataError,
                severity: Severity::Low,
                suggestion: "n/a".to_string(),
                recovery_strategy: RecoveryStrategy::FailFast,
            }],
            ..ResilienceConfig::default()
        };

        assert!(matches!(
            config.classifier(),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_retry_and_wait_options() {
        let config = ResilienceConfig::from_toml_str(FULL_CONFIG).unwrap();

        let options: RetryOptions<std::io::Error> = config.retry_options().unwrap();
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.delay, Duration::from_millis(250));
        assert_eq!(options.backoff_multiplier, 1.5);
        assert_eq!(
            options.classifier().classify("stale element").category,
            ErrorCategory::StaleElement
        );

        let wait = config.wait_options();
        assert_eq!(wait.timeout, Duration::from_secs(2));
        assert_eq!(wait.interval, Duration::from_millis(20));
    }

    #[test]
    fn test_retry_options_without_patterns_use_shared_classifier() {
        let options: RetryOptions<std::io::Error> =
            ResilienceConfig::default().retry_options().unwrap();
        assert_eq!(
            options.classifier().pattern_count(),
            ErrorClassifier::shared().pattern_count()
        );
    }

    #[test]
    fn test_serializes_to_toml() {
        let config = ResilienceConfig::from_toml_str(FULL_CONFIG).unwrap();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("max_attempts = 5"));
        assert!(rendered.contains("STALE_ELEMENT"));
    }
}
