//! Runs every statistic family against an event source.

use super::challenges::{aggregate_challenges, CHALLENGE_COMPLETED, CHALLENGE_STARTED};
use super::community::{
    aggregate_community, CommunityEvents, JOURNAL_ENTRY_CREATED, MILESTONE_COMPLETED,
};
use super::effectiveness::{aggregate_effectiveness, STREAK_MILESTONE};
use super::stages::{aggregate_stages, STAGE_ADVANCED};
use super::tools::{aggregate_tool_usage, TOOL_SESSION_COMPLETED};
use crate::config::Config;
use crate::models::{non_empty, ChallengeRecord, StatsDocument};
use crate::posthog::EventSource;
use chrono::{DateTime, Utc};
use tracing::info;

/// Fetch and aggregate every family in turn, stamped with `now`.
///
/// Each family fetches its own events, so one failed fetch only blanks the
/// families that depend on it.
pub async fn collect_stats<S: EventSource>(
    source: &S,
    config: &Config,
    now: DateTime<Utc>,
) -> StatsDocument {
    let lookback = &config.lookback;
    let thresholds = &config.thresholds;
    let mut document = StatsDocument::new(thresholds.clone(), now);

    // Challenges
    let started = source.events(CHALLENGE_STARTED, lookback.challenges).await;
    let completed = source.events(CHALLENGE_COMPLETED, lookback.challenges).await;
    document.challenge_stats = aggregate_challenges(&config.challenges.ids, &started, &completed)
        .into_iter()
        .map(ChallengeRecord::from)
        .collect();
    info!("Challenges: {} with starts", document.challenge_stats.len());

    // Tools and categories
    let sessions = source.events(TOOL_SESSION_COMPLETED, lookback.tools).await;
    let usage = aggregate_tool_usage(&sessions, thresholds);
    info!(
        "Tools: {} reportable, {} categories",
        usage.tools.len(),
        usage.categories.len()
    );
    document.tool_stats = non_empty(usage.tools);
    document.tool_category_stats = non_empty(usage.categories);

    // Stages
    let advancements = source.events(STAGE_ADVANCED, lookback.stages).await;
    document.stage_stats = non_empty(aggregate_stages(&advancements, thresholds.min_stage_users));
    info!(
        "Stages: {} reportable",
        document.stage_stats.as_ref().map_or(0, Vec::len)
    );

    // Community
    let recent_sessions = source.events(TOOL_SESSION_COMPLETED, lookback.community).await;
    let recent_completions = source.events(CHALLENGE_COMPLETED, lookback.community).await;
    let milestones = source.events(MILESTONE_COMPLETED, lookback.community).await;
    let journal_entries = source.events(JOURNAL_ENTRY_CREATED, lookback.community).await;
    document.community_stats = aggregate_community(
        CommunityEvents {
            tool_sessions: &recent_sessions,
            challenge_completions: &recent_completions,
            milestones: &milestones,
            journal_entries: &journal_entries,
        },
        now,
        thresholds.min_community_users,
    );
    if document.community_stats.is_none() {
        info!("Community: below {} active users today", thresholds.min_community_users);
    }

    // Effectiveness
    let mood_sessions = source
        .events(TOOL_SESSION_COMPLETED, lookback.effectiveness)
        .await;
    let streaks = source.events(STREAK_MILESTONE, lookback.effectiveness).await;
    document.effectiveness_stats =
        aggregate_effectiveness(&mood_sessions, &streaks, thresholds.min_effectiveness_samples);
    if let Some(ref stats) = document.effectiveness_stats {
        info!(
            "Effectiveness: {} tools with positive mood impact",
            stats.mood_improvement_by_tool.len()
        );
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{event, event_at};
    use crate::models::Event;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory source that records every request.
    #[derive(Default)]
    struct StaticSource {
        events: HashMap<String, Vec<Event>>,
        requests: RefCell<Vec<(String, u32)>>,
    }

    impl StaticSource {
        fn with(mut self, name: &str, events: Vec<Event>) -> Self {
            self.events.entry(name.to_string()).or_default().extend(events);
            self
        }
    }

    impl EventSource for StaticSource {
        async fn events(&self, event_name: &str, lookback_days: u32) -> Vec<Event> {
            self.requests
                .borrow_mut()
                .push((event_name.to_string(), lookback_days));
            self.events.get(event_name).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn test_empty_source_yields_null_families() {
        let source = StaticSource::default();
        let config = Config::default();
        let now = Utc::now();

        let doc = tokio_test::block_on(collect_stats(&source, &config, now));

        assert!(doc.challenge_stats.is_empty());
        assert!(doc.path_stats.is_none());
        assert!(doc.tool_stats.is_none());
        assert!(doc.tool_category_stats.is_none());
        assert!(doc.stage_stats.is_none());
        assert!(doc.community_stats.is_none());
        assert!(doc.effectiveness_stats.is_none());
        assert_eq!(doc.thresholds, config.thresholds);
    }

    #[test]
    fn test_families_use_their_lookback_windows() {
        let source = StaticSource::default();
        let mut config = Config::default();
        config.lookback.tools = 14;
        config.lookback.community = 7;

        tokio_test::block_on(collect_stats(&source, &config, Utc::now()));

        let requests = source.requests.borrow();
        assert_eq!(requests.len(), 10);
        assert_eq!(requests[0], (CHALLENGE_STARTED.to_string(), 90));
        assert_eq!(requests[2], (TOOL_SESSION_COMPLETED.to_string(), 14));
        assert!(requests.contains(&(JOURNAL_ENTRY_CREATED.to_string(), 7)));
        assert!(requests.contains(&(STREAK_MILESTONE.to_string(), 90)));
    }

    #[test]
    fn test_populated_source() {
        let now = Utc::now();
        let started: Vec<Event> = (0..10)
            .map(|i| event(CHALLENGE_STARTED, &format!("u{}", i), json!({"challenge_id": "breathing_7day"})))
            .collect();
        let completed: Vec<Event> = (0..4)
            .map(|i| event(CHALLENGE_COMPLETED, &format!("u{}", i), json!({"challenge_id": "breathing_7day"})))
            .collect();
        let sessions: Vec<Event> = (0..60)
            .map(|i| {
                event_at(
                    TOOL_SESSION_COMPLETED,
                    &format!("u{}", i % 15),
                    now,
                    json!({"tool_id": "box_breathing", "tool_category": "breathing", "mood_impact": 1.5}),
                )
            })
            .collect();

        let source = StaticSource::default()
            .with(CHALLENGE_STARTED, started)
            .with(CHALLENGE_COMPLETED, completed)
            .with(TOOL_SESSION_COMPLETED, sessions);

        let doc = tokio_test::block_on(collect_stats(&source, &Config::default(), now));

        assert_eq!(doc.challenge_stats.len(), 1);
        match &doc.challenge_stats[0] {
            ChallengeRecord::Computed(stat) => assert_eq!(stat.completion_rate, 0.4),
            other => panic!("expected a computed record, got {:?}", other),
        }
        assert_eq!(doc.tool_stats.as_ref().map(Vec::len), Some(1));
        assert_eq!(doc.tool_category_stats.as_ref().map(Vec::len), Some(1));
        assert!(doc.stage_stats.is_none());

        let community = doc.community_stats.expect("15 users active today");
        assert_eq!(community.active_users_today, 15);

        let effectiveness = doc.effectiveness_stats.unwrap();
        assert_eq!(
            effectiveness.mood_improvement_by_tool.get("box_breathing"),
            Some(&1.5)
        );
    }
}
