//! HTTP client for the PostHog events and query endpoints.

use crate::config::{Credentials, PostHogConfig};
use crate::error::FetchError;
use crate::models::Event;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something that can hand out events by name over a lookback window.
///
/// Failures are absorbed: an unavailable source yields an empty list so a
/// single bad fetch degrades one statistic family instead of the whole run.
#[allow(async_fn_in_trait)]
pub trait EventSource {
    async fn events(&self, event_name: &str, lookback_days: u32) -> Vec<Event>;
}

/// One page of the events endpoint.
#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    results: Vec<Event>,
}

/// PostHog API client.
pub struct PostHogClient {
    http_client: reqwest::Client,
    host: String,
    project_id: String,
    api_key: String,
    event_limit: usize,
    timeout_seconds: u64,
    show_progress: bool,
}

impl PostHogClient {
    /// Create a client for one project.
    pub fn new(
        config: &PostHogConfig,
        credentials: &Credentials,
        show_progress: bool,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            host: config.host.trim_end_matches('/').to_string(),
            project_id: credentials.project_id.clone(),
            api_key: credentials.api_key.clone(),
            event_limit: config.event_limit,
            timeout_seconds: config.timeout_seconds,
            show_progress,
        })
    }

    fn project_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/projects/{}/{}",
            self.host, self.project_id, endpoint
        )
    }

    fn map_send_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout_seconds)
        } else if e.is_connect() {
            FetchError::Connect(self.host.clone())
        } else {
            FetchError::Request(e)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(FetchError::Api { status, body })
    }

    /// Fetch events of one type, propagating any failure.
    ///
    /// Only the first page is requested; anything past `event_limit` is dropped.
    pub async fn try_fetch_events(
        &self,
        event_name: &str,
        lookback_days: u32,
    ) -> Result<Vec<Event>, FetchError> {
        let url = self.project_url("events");
        let after = (Utc::now() - ChronoDuration::days(i64::from(lookback_days)))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let limit = self.event_limit.to_string();

        debug!("GET {} event={} after={}", url, event_name, after);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[
                ("event", event_name),
                ("after", after.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;
        let page: EventsPage = response.json().await.map_err(FetchError::Decode)?;

        let mut events = page.results;
        if events.len() >= self.event_limit {
            warn!(
                "{} hit the {} event cap; older events are not counted",
                event_name, self.event_limit
            );
            events.truncate(self.event_limit);
        }

        Ok(events)
    }

    /// Fetch events of one type, logging and absorbing any failure.
    pub async fn fetch_events(&self, event_name: &str, lookback_days: u32) -> Vec<Event> {
        let spinner = self.spinner(format!("Fetching {} events...", event_name));

        let result = self.try_fetch_events(event_name, lookback_days).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match result {
            Ok(events) => {
                info!("Fetched {} {} events", events.len(), event_name);
                events
            }
            Err(e) => {
                warn!("Failed to fetch {} events: {}", event_name, e);
                Vec::new()
            }
        }
    }

    /// Run an ad-hoc HogQL query and return the raw JSON response.
    pub async fn query(&self, hogql: &str) -> Result<Value, FetchError> {
        let url = self.project_url("query");
        let body = json!({
            "query": {
                "kind": "HogQLQuery",
                "query": hogql,
            }
        });

        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_status(response).await?;
        response.json().await.map_err(FetchError::Decode)
    }

    fn spinner(&self, message: String) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

impl EventSource for PostHogClient {
    async fn events(&self, event_name: &str, lookback_days: u32) -> Vec<Event> {
        self.fetch_events(event_name, lookback_days).await
    }
}
