//! Logging setup for the retry diagnostics.
//!
//! The retry executor reports through `tracing`: one warning per retried
//! failure and one error for the failure it gives up on. This module installs
//! the stock subscriber for those records:
//! - Writes to stderr so stdout stays free for command output
//! - Supports configurable log levels via `RUST_LOG`, `LOG_LEVEL` or
//!   programmatic configuration
//! - `LOG_SILENT=true` turns all output off (useful in unit-test runs)

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warning level
    Warn,
    /// Error level - least verbose
    Error,
    /// Disable logging entirely
    Off,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    /// Parses a level name such as `warn` or `DEBUG`. `warning` is accepted
    /// as an alias for `warn`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            "off" | "silent" => Some(LogLevel::Off),
            _ => None,
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
            LogLevel::Off => Level::ERROR, // Will be filtered out by directive
        }
    }
}

impl From<u8> for LogLevel {
    /// Convert verbosity count to log level.
    /// 0 = Warn, 1 = Info, 2 = Debug, 3+ = Trace
    fn from(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Configuration for the log subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: LogLevel,
    /// Whether to include timestamps
    pub with_timestamps: bool,
    /// Whether to include the target (module path)
    pub with_target: bool,
    /// Whether to include thread IDs
    pub with_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: true,
            with_target: true,
            with_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set whether to include timestamps.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Set whether to include the target (module path).
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Set whether to include thread IDs.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Create a configuration from verbosity level (see [`LogLevel::from`]).
    pub fn from_verbosity(verbosity: u8) -> Self {
        Self::default().with_level(LogLevel::from(verbosity))
    }

    /// Apply `LOG_LEVEL` and `LOG_SILENT` from the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(
            std::env::var("LOG_LEVEL").ok().as_deref(),
            std::env::var("LOG_SILENT").ok().as_deref(),
        )
    }

    /// Configuration for the command-line binary.
    ///
    /// Without `-v` the level starts at warn and `LOG_LEVEL` / `LOG_SILENT`
    /// apply. An explicit verbosity count wins over both.
    pub fn for_cli(verbosity: u8, level: Option<&str>, silent: Option<&str>) -> Self {
        let config = Self::from_verbosity(verbosity);
        if verbosity > 0 {
            return config;
        }
        config.with_env_overrides(level, silent)
    }

    /// Apply `LOG_LEVEL` / `LOG_SILENT` style overrides. Silence wins over
    /// any level; unrecognised level names are ignored.
    pub fn with_env_overrides(mut self, level: Option<&str>, silent: Option<&str>) -> Self {
        if let Some(parsed) = level.and_then(LogLevel::parse) {
            self.level = parsed;
        }
        if silent.is_some_and(|value| value.trim().eq_ignore_ascii_case("true")) {
            self.level = LogLevel::Off;
        }
        self
    }
}

/// Initialize logging with the given configuration.
///
/// `RUST_LOG`, when set, takes precedence over the configured level. Calling
/// this more than once is harmless: later calls leave the first subscriber
/// in place.
///
/// # Examples
///
/// ```no_run
/// use flakeguard::logging::{init_logging, LogLevel, LoggingConfig};
///
/// init_logging(
///     LoggingConfig::new()
///         .with_level(LogLevel::Debug)
///         .with_timestamps(false),
/// );
/// ```
pub fn init_logging(config: LoggingConfig) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.level.as_directive())
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids);

    let result = if config.with_timestamps {
        subscriber.try_init()
    } else {
        subscriber.without_time().try_init()
    };

    if let Err(error) = result {
        tracing::debug!("Logging already initialized: {}", error);
    }
}

/// Initialize logging from `LOG_LEVEL` / `LOG_SILENT` (info level by default).
pub fn init_default_logging() {
    init_logging(LoggingConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_verbosity() {
        assert_eq!(LogLevel::from(0), LogLevel::Warn);
        assert_eq!(LogLevel::from(1), LogLevel::Info);
        assert_eq!(LogLevel::from(2), LogLevel::Debug);
        assert_eq!(LogLevel::from(10), LogLevel::Trace);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse(" debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("silent"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::new()
            .with_level(LogLevel::Debug)
            .with_timestamps(false)
            .with_target(false)
            .with_thread_ids(true);

        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.with_timestamps);
        assert!(!config.with_target);
        assert!(config.with_thread_ids);
    }

    #[test]
    fn test_env_overrides() {
        let config = LoggingConfig::new().with_env_overrides(Some("error"), None);
        assert_eq!(config.level, LogLevel::Error);

        let config = LoggingConfig::new().with_env_overrides(Some("debug"), Some("true"));
        assert_eq!(config.level, LogLevel::Off);

        let config = LoggingConfig::new().with_env_overrides(Some("nonsense"), Some("false"));
        assert_eq!(config.level, LogLevel::Info);
    }

    #[test]
    fn test_cli_verbosity_steps_above_default() {
        assert_eq!(LoggingConfig::for_cli(0, None, None).level, LogLevel::Warn);
        assert_eq!(LoggingConfig::for_cli(1, None, None).level, LogLevel::Info);
        assert_eq!(LoggingConfig::for_cli(2, None, None).level, LogLevel::Debug);
    }

    #[test]
    fn test_cli_env_applies_only_without_verbosity() {
        let config = LoggingConfig::for_cli(0, Some("debug"), None);
        assert_eq!(config.level, LogLevel::Debug);

        let config = LoggingConfig::for_cli(0, None, Some("true"));
        assert_eq!(config.level, LogLevel::Off);

        let config = LoggingConfig::for_cli(2, Some("error"), Some("true"));
        assert_eq!(config.level, LogLevel::Debug);
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(LoggingConfig::new().with_level(LogLevel::Off));
        init_logging(LoggingConfig::new().with_level(LogLevel::Off));
    }
}
