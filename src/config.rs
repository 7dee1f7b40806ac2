//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.stats-updater.toml` files. Credentials never live in the file; they come
//! from the environment or the command line.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".stats-updater.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// PostHog connection settings.
    #[serde(default)]
    pub posthog: PostHogConfig,

    /// Lookback windows per statistic family.
    #[serde(default)]
    pub lookback: LookbackConfig,

    /// Minimum sample sizes before a group is reported.
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Known challenges.
    #[serde(default)]
    pub challenges: ChallengeConfig,
}

/// PostHog connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostHogConfig {
    /// API host (`https://eu.posthog.com` for EU projects).
    #[serde(default = "default_host")]
    pub host: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum events returned per query.
    #[serde(default = "default_event_limit")]
    pub event_limit: usize,
}

impl Default for PostHogConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            timeout_seconds: default_timeout(),
            event_limit: default_event_limit(),
        }
    }
}

fn default_host() -> String {
    "https://us.posthog.com".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_event_limit() -> usize {
    10_000
}

/// Lookback windows in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookbackConfig {
    #[serde(default = "default_long_window")]
    pub challenges: u32,
    #[serde(default = "default_tool_window")]
    pub tools: u32,
    #[serde(default = "default_long_window")]
    pub stages: u32,
    #[serde(default = "default_community_window")]
    pub community: u32,
    #[serde(default = "default_long_window")]
    pub effectiveness: u32,
}

impl Default for LookbackConfig {
    fn default() -> Self {
        Self {
            challenges: default_long_window(),
            tools: default_tool_window(),
            stages: default_long_window(),
            community: default_community_window(),
            effectiveness: default_long_window(),
        }
    }
}

impl LookbackConfig {
    /// Use the same window for every family.
    pub fn set_all(&mut self, days: u32) {
        self.challenges = days;
        self.tools = days;
        self.stages = days;
        self.community = days;
        self.effectiveness = days;
    }

    fn all(&self) -> [u32; 5] {
        [
            self.challenges,
            self.tools,
            self.stages,
            self.community,
            self.effectiveness,
        ]
    }
}

fn default_long_window() -> u32 {
    90
}

fn default_tool_window() -> u32 {
    30
}

fn default_community_window() -> u32 {
    7
}

/// Minimum sample sizes. Written into the output document as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_min_tool_sessions")]
    pub min_tool_sessions: usize,
    #[serde(default = "default_min_tool_users")]
    pub min_tool_users: usize,
    #[serde(default = "default_min_category_sessions")]
    pub min_category_sessions: usize,
    #[serde(default = "default_min_stage_users")]
    pub min_stage_users: usize,
    #[serde(default = "default_min_community_users")]
    pub min_community_users: usize,
    #[serde(default = "default_min_effectiveness_samples")]
    pub min_effectiveness_samples: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_tool_sessions: default_min_tool_sessions(),
            min_tool_users: default_min_tool_users(),
            min_category_sessions: default_min_category_sessions(),
            min_stage_users: default_min_stage_users(),
            min_community_users: default_min_community_users(),
            min_effectiveness_samples: default_min_effectiveness_samples(),
        }
    }
}

fn default_min_tool_sessions() -> usize {
    50
}

fn default_min_tool_users() -> usize {
    10
}

fn default_min_category_sessions() -> usize {
    20
}

fn default_min_stage_users() -> usize {
    20
}

fn default_min_community_users() -> usize {
    10
}

fn default_min_effectiveness_samples() -> usize {
    20
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where the stats document is written.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("config/stats.json")
}

/// Challenge catalogue. Must match the ids shipped in the app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    #[serde(default = "default_challenge_ids")]
    pub ids: Vec<String>,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ids: default_challenge_ids(),
        }
    }
}

fn default_challenge_ids() -> Vec<String> {
    vec![
        "movement_7day",
        "morning_walks_30",
        "strength_training_8week",
        "stretching_14day",
        "steps_10k_21day",
        "sleep_schedule_14day",
        "evening_winddown_21",
        "power_naps_7day",
        "hydration_30day",
        "meal_prep_4week",
        "no_sugar_14day",
        "breathing_7day",
        "meditation_21day",
        "mindful_eating_14",
        "gratitude_30day",
        "gratitude_letters_7",
        "journal_streak_30",
        "morning_pages_14",
        "evening_reflection_21",
        "morning_routine_21",
        "evening_routine_14",
        "digital_detox_weekend",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// PostHog credentials, supplied through the process environment.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub project_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl Credentials {
    /// Build credentials from CLI/env values. Both must be present and non-blank.
    pub fn from_parts(
        api_key: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key.map(str::trim).filter(|s| !s.is_empty());
        let project_id = project_id.map(str::trim).filter(|s| !s.is_empty());

        match (api_key, project_id) {
            (Some(api_key), Some(project_id)) => Ok(Self {
                api_key: api_key.to_string(),
                project_id: project_id.to_string(),
            }),
            _ => Err(ConfigError::MissingCredentials),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.posthog.host = host.clone();
        }
        if let Some(timeout) = args.timeout {
            self.posthog.timeout_seconds = timeout;
        }
        if let Some(days) = args.lookback_days {
            self.lookback.set_all(days);
        }
        if let Some(ref output) = args.output {
            self.output.path = output.clone();
        }
    }

    /// Check the merged configuration for values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = &self.posthog.host;
        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "PostHog host must start with 'http://' or 'https://': {}",
                host
            )));
        }
        if self.posthog.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.posthog.event_limit == 0 {
            return Err(ConfigError::Invalid(
                "event_limit must be at least 1".to_string(),
            ));
        }
        if self.lookback.all().contains(&0) {
            return Err(ConfigError::Invalid(
                "lookback windows must be at least 1 day".to_string(),
            ));
        }
        if self.challenges.ids.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one challenge id must be configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
