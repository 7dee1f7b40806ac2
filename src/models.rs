//! Data models for the stats updater.
//!
//! This module contains the raw analytics event shape returned by PostHog
//! and the summary records written to the stats document.

use crate::config::Thresholds;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Format used for the `last_updated` field.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A single analytics event as returned by the PostHog events API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    /// Identifier of the user who produced the event.
    #[serde(default)]
    pub distinct_id: String,
    /// Event name (e.g. `challenge_started`).
    #[serde(default)]
    pub event: String,
    /// When the event happened.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Free-form event properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Event {
    /// Returns a non-empty string property.
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns a numeric property. Numeric strings are accepted.
    pub fn prop_f64(&self, key: &str) -> Option<f64> {
        let value = match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    /// Returns a boolean flag, treating missing or unrecognized values as false.
    pub fn prop_flag(&self, key: &str) -> bool {
        match self.properties.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    /// Hour of day the event happened in.
    ///
    /// Prefers the client-reported `hour_of_day` property (local time on the
    /// device) and falls back to the UTC hour of the event timestamp.
    pub fn hour_of_day(&self) -> Option<u32> {
        let reported = self
            .prop_f64("hour_of_day")
            .filter(|h| (0.0..24.0).contains(h))
            .map(|h| h as u32);

        reported.or_else(|| self.timestamp.map(|ts| ts.hour()))
    }
}

/// Completion statistics for one challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeStat {
    pub challenge_id: String,
    pub completion_rate: f64,
    pub total_starts: u64,
    pub total_completions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_days_to_complete: Option<u64>,
}

/// One entry of `challenge_stats`.
///
/// Records computed this run are typed. Records carried over from the
/// previous document are kept as the raw JSON object, so fields this
/// program does not know about survive the rewrite.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChallengeRecord {
    Computed(ChallengeStat),
    Carried(Map<String, Value>),
}

impl ChallengeRecord {
    /// Wraps a previous record, `None` unless it has a non-empty string id.
    pub fn carried(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) if Self::id_of(&map).is_some() => Some(Self::Carried(map)),
            _ => None,
        }
    }

    pub fn challenge_id(&self) -> Option<&str> {
        match self {
            Self::Computed(stat) => Some(&stat.challenge_id),
            Self::Carried(map) => Self::id_of(map),
        }
    }

    fn id_of(map: &Map<String, Value>) -> Option<&str> {
        map.get("challenge_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

impl From<ChallengeStat> for ChallengeRecord {
    fn from(stat: ChallengeStat) -> Self {
        Self::Computed(stat)
    }
}

/// Usage statistics for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStat {
    pub tool_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_category: Option<String>,
    pub total_sessions: u64,
    pub unique_users: u64,
    pub completion_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_mood_impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_usage_hour: Option<u32>,
}

/// Usage statistics for a tool category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCategoryStat {
    pub category: String,
    pub total_sessions: u64,
    pub completion_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_mood_impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_popular_tool: Option<String>,
}

/// Progression statistics for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStat {
    pub stage: String,
    pub users_reached: u64,
    pub users_completed: u64,
    pub average_days_in_stage: f64,
    /// Reserved; always empty.
    #[serde(default)]
    pub top_tools: Vec<String>,
    /// Reserved; always empty.
    #[serde(default)]
    pub top_challenges: Vec<String>,
}

/// Same-day and same-week community activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityStats {
    pub active_users_today: u64,
    pub active_users_this_week: u64,
    pub challenges_completed_today: u64,
    pub challenges_completed_this_week: u64,
    pub milestones_today: u64,
    pub meditation_minutes_today: u64,
    pub journal_entries_today: u64,
}

/// Tool effectiveness and engagement patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessStats {
    /// Average mood impact per tool, positive averages only.
    pub mood_improvement_by_tool: BTreeMap<String, f64>,
    pub average_streak_length: f64,
    pub peak_engagement_hour: u32,
    pub weekend_weekday_ratio: f64,
    /// Fixed estimate until cohort analysis exists.
    pub retention_7_day: f64,
    /// Fixed estimate until cohort analysis exists.
    pub retention_30_day: f64,
    /// Number of tool session events the stats were computed from.
    pub sample_size: u64,
}

/// The complete stats document consumed by the app.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsDocument {
    pub challenge_stats: Vec<ChallengeRecord>,
    /// Not computed; kept so the app schema stays stable.
    pub path_stats: Option<Vec<Value>>,
    pub tool_stats: Option<Vec<ToolStat>>,
    pub tool_category_stats: Option<Vec<ToolCategoryStat>>,
    pub stage_stats: Option<Vec<StageStat>>,
    pub community_stats: Option<CommunityStats>,
    pub effectiveness_stats: Option<EffectivenessStats>,
    pub thresholds: Thresholds,
    pub last_updated: String,
}

impl StatsDocument {
    /// Creates an empty document stamped with the given time.
    pub fn new(thresholds: Thresholds, now: DateTime<Utc>) -> Self {
        Self {
            challenge_stats: Vec::new(),
            path_stats: None,
            tool_stats: None,
            tool_category_stats: None,
            stage_stats: None,
            community_stats: None,
            effectiveness_stats: None,
            thresholds,
            last_updated: now.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Wraps a non-empty list, mapping empty lists to `None`.
pub fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
