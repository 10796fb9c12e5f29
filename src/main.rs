use clap::{ArgAction, Parser, Subcommand};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use flakeguard::config::ResilienceConfig;
use flakeguard::error::{ErrorContext, RecoveryStrategy, Severity};
use flakeguard::logging::{init_logging, LoggingConfig};
use flakeguard::retry::RetryOptions;

/// Configuration file picked up from the working directory when `--config`
/// is not given.
const DEFAULT_CONFIG_FILE: &str = "flakeguard.toml";

#[derive(Parser, Debug)]
#[command(name = "flakeguard")]
#[command(version)]
#[command(about = "Classify end-to-end test failures and plan their retries")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify error messages (exits with 2 if any is not retryable)
    Classify {
        /// Error messages to classify
        #[arg(required = true, value_name = "MESSAGE")]
        messages: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the classification rules in evaluation order
    Patterns,
    /// Show the retry delay schedule of a recovery strategy
    Delays {
        /// Recovery strategy, e.g. RETRY_WITH_BACKOFF
        #[arg(value_name = "STRATEGY")]
        strategy: RecoveryStrategy,

        /// Number of failed attempts to show
        #[arg(long, short = 'n', default_value = "5")]
        attempts: u32,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// Exit codes for the classify command
mod exit_codes {
    use std::process::ExitCode;

    /// At least one message classified as fail-fast
    pub fn not_retryable() -> ExitCode {
        ExitCode::from(2)
    }
}

#[derive(Serialize)]
struct ClassifyReport<'a> {
    #[serde(flatten)]
    context: &'a ErrorContext,
    retryable: bool,
    delays_ms: Vec<u64>,
}

fn load_config(path: Option<&Path>) -> Result<ResilienceConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ResilienceConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            ResilienceConfig::load(DEFAULT_CONFIG_FILE)?
        }
        None => ResilienceConfig::from_env()?,
    };
    Ok(config)
}

fn paint_severity(severity: Severity, use_color: bool) -> String {
    let label = severity.as_str();
    if !use_color {
        return label.to_string();
    }
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.green().to_string(),
    }
}

fn format_delays(delays: &[u64]) -> String {
    if delays.is_empty() {
        return "none".to_string();
    }
    delays
        .iter()
        .map(|ms| format!("{}ms", ms))
        .collect::<Vec<_>>()
        .join(", ")
}

fn run_classify(
    config: &ResilienceConfig,
    messages: &[String],
    json: bool,
    use_color: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let options: RetryOptions<String> = config.retry_options()?;
    let classifier = options.classifier();

    let contexts: Vec<ErrorContext> = messages.iter().map(|m| classifier.classify(m)).collect();
    let reports: Vec<ClassifyReport<'_>> = contexts
        .iter()
        .map(|context| {
            let retryable = context.is_retryable();
            let delays_ms = if retryable {
                (1..options.max_attempts)
                    .map(|attempt| options.delay_for(context, attempt).as_millis() as u64)
                    .collect()
            } else {
                Vec::new()
            };
            ClassifyReport {
                context,
                retryable,
                delays_ms,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let context = report.context;
            let category = if use_color {
                context.category.as_str().bold().to_string()
            } else {
                context.category.as_str().to_string()
            };
            println!(
                "{} ({}) {}",
                category,
                paint_severity(context.severity, use_color),
                context.message
            );
            println!("  strategy:   {}", context.recovery_strategy);
            println!(
                "  retryable:  {}",
                if report.retryable { "yes" } else { "no" }
            );
            println!("  suggestion: {}", context.suggestion);
            println!("  delays:     {}", format_delays(&report.delays_ms));
        }
    }

    if reports.iter().all(|report| report.retryable) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(exit_codes::not_retryable())
    }
}

fn run_patterns(config: &ResilienceConfig, use_color: bool) -> Result<(), Box<dyn std::error::Error>> {
    let classifier = config.classifier()?;
    for (index, pattern) in classifier.patterns().iter().enumerate() {
        println!(
            "{:>2}. {} ({}) {}",
            index + 1,
            pattern.category(),
            paint_severity(pattern.severity(), use_color),
            pattern.recovery_strategy()
        );
        println!("    /{}/i", pattern.regex().as_str());
    }
    Ok(())
}

fn run_delays(strategy: RecoveryStrategy, attempts: u32) {
    println!("{}", strategy);
    for attempt in 1..=attempts {
        match strategy.retry_delay(attempt) {
            Some(delay) => println!("  attempt {}: {}ms", attempt, delay.as_millis()),
            None => println!("  attempt {}: no retry delay", attempt),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let use_color = !cli.no_color && std::env::var("NO_COLOR").is_err();

    let logging = LoggingConfig::for_cli(
        cli.verbose,
        std::env::var("LOG_LEVEL").ok().as_deref(),
        std::env::var("LOG_SILENT").ok().as_deref(),
    );
    init_logging(logging.with_timestamps(false));

    let config = load_config(cli.config.as_deref()).map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::debug!(
        max_attempts = config.retry.max_attempts,
        custom_patterns = config.patterns.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Classify { ref messages, json } => {
            return run_classify(&config, messages, json, use_color);
        }
        Commands::Patterns => run_patterns(&config, use_color)?,
        Commands::Delays { strategy, attempts } => run_delays(strategy, attempts),
        Commands::Config => print!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(ExitCode::SUCCESS)
}
