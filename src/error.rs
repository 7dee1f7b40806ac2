//! Error types for the stats updater.

use thiserror::Error;

/// Errors raised while talking to the PostHog API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to PostHog at {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("PostHog API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse PostHog response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Errors raised while assembling the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("POSTHOG_API_KEY and POSTHOG_PROJECT_ID must be set")]
    MissingCredentials,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
