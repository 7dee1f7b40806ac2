//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Stats Updater - PostHog analytics to social-proof stats
///
/// Pulls challenge, tool, stage and community events from PostHog,
/// aggregates them, and writes the stats document read by the app.
///
/// Examples:
///   stats-updater
///   stats-updater --output config/stats.json --verbose
///   stats-updater --dry-run
///   stats-updater --hogql "SELECT count() FROM events"
///   stats-updater --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// PostHog personal API key
    #[arg(long, env = "POSTHOG_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// PostHog project id
    #[arg(long, env = "POSTHOG_PROJECT_ID")]
    pub project_id: Option<String>,

    /// PostHog API host
    ///
    /// Use https://eu.posthog.com for EU-hosted projects.
    /// Overrides the config file setting.
    #[arg(long, env = "POSTHOG_HOST", value_name = "URL")]
    pub host: Option<String>,

    /// Output file path for the stats document
    ///
    /// Default: from config or config/stats.json
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .stats-updater.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Use the same lookback window (in days) for every statistic family
    #[arg(long, value_name = "DAYS")]
    pub lookback_days: Option<u32>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Compute stats and print them without writing the output file
    #[arg(long)]
    pub dry_run: bool,

    /// Run an ad-hoc HogQL query, print the JSON response and exit
    #[arg(long, value_name = "QUERY", conflicts_with = "dry_run")]
    pub hogql: Option<String>,

    /// Generate a default .stats-updater.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref host) = self.host {
            if !host.starts_with("http://") && !host.starts_with("https://") {
                return Err("PostHog host must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(days) = self.lookback_days {
            if days == 0 {
                return Err("Lookback window must be at least 1 day".to_string());
            }
        }

        if let Some(ref query) = self.hogql {
            if query.trim().is_empty() {
                return Err("HogQL query must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
