//! Stats Updater - PostHog analytics to social-proof stats
//!
//! A CLI job that pulls behavioral events from PostHog, aggregates them
//! into completion rates, usage counts and community activity, and writes
//! the stats document the mobile app displays.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error (missing credentials, invalid config, write failure, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod posthog;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, Credentials, DEFAULT_CONFIG_FILE};
use posthog::PostHogClient;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Stats Updater v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Update failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .stats-updater.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize thresholds, lookback windows, and challenges.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one update: fetch, aggregate, merge, write.
async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    // Configuration is fixed for the rest of the run.
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    // Credentials are checked before any network call.
    let credentials = Credentials::from_parts(args.api_key.as_deref(), args.project_id.as_deref())?;

    let client = PostHogClient::new(&config.posthog, &credentials, !args.quiet)
        .context("Failed to create HTTP client")?;

    if let Some(ref query) = args.hogql {
        return run_query(&client, query).await;
    }

    println!("📥 Calculating stats from PostHog...");
    println!("   Host: {}", config.posthog.host);
    println!("   Project: {}", credentials.project_id);

    let mut document = analysis::collect_stats(&client, &config, Utc::now()).await;

    // Keep challenges that had no activity this run.
    let output_path = config.output.path.clone();
    let previous = report::load_previous_challenges(&output_path)?;
    let fresh = document.challenge_stats.len();
    document.challenge_stats = report::merge_challenge_stats(document.challenge_stats, previous);
    if document.challenge_stats.len() > fresh {
        info!(
            "Carried forward {} challenges from the previous run",
            document.challenge_stats.len() - fresh
        );
    }

    println!("\n📊 Stats Summary:");
    for line in report::generate_summary_text(&document).lines() {
        println!("   {}", line);
    }

    if args.dry_run {
        println!("\n🔍 Dry run: stats not written.\n");
        print!("{}", report::generate_json(&document)?);
        return Ok(());
    }

    report::write_document(&document, &output_path)?;

    println!(
        "\n✅ Updated {} with {} challenges in {:.1}s",
        output_path.display(),
        document.challenge_stats.len(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Handle --hogql: run the query and print the response.
async fn run_query(client: &PostHogClient, query: &str) -> Result<()> {
    info!("Running HogQL query");
    let response = client.query(query).await.context("HogQL query failed")?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
