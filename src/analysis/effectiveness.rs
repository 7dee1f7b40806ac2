//! Tool effectiveness and engagement patterns.

use super::aggregator::{mean, round_to, GroupedAccumulator, PeakCounter};
use super::tools::ToolSession;
use crate::models::{EffectivenessStats, Event};
use chrono::{Datelike, Weekday};
use std::collections::BTreeMap;

pub const STREAK_MILESTONE: &str = "streak_milestone";

pub const DEFAULT_STREAK_LENGTH: f64 = 7.0;
pub const DEFAULT_PEAK_HOUR: u32 = 12;
pub const DEFAULT_WEEKEND_RATIO: f64 = 0.6;

// Cohort retention is not derivable from raw event pages; these are
// published estimates until a cohort query replaces them.
pub const RETENTION_7_DAY: f64 = 0.45;
pub const RETENTION_30_DAY: f64 = 0.25;

#[derive(Debug, Default)]
struct EngagementAccumulator {
    sessions: u64,
    hours: PeakCounter<u32>,
    weekend: u64,
    weekday: u64,
}

impl EngagementAccumulator {
    fn record(&mut self, event: &Event) {
        self.sessions += 1;

        if let Some(hour) = event.hour_of_day() {
            self.hours.record(hour);
        }

        if let Some(ts) = event.timestamp {
            match ts.weekday() {
                Weekday::Sat | Weekday::Sun => self.weekend += 1,
                _ => self.weekday += 1,
            }
        }
    }

    fn weekend_ratio(&self) -> f64 {
        if self.weekday == 0 {
            DEFAULT_WEEKEND_RATIO
        } else {
            round_to(self.weekend as f64 / self.weekday as f64, 3)
        }
    }
}

/// Effectiveness stats, or `None` when no sessions were fetched at all.
///
/// Tools only appear in the mood map with at least `min_samples` mood
/// samples and a strictly positive average.
pub fn aggregate_effectiveness(
    tool_sessions: &[Event],
    streak_milestones: &[Event],
    min_samples: usize,
) -> Option<EffectivenessStats> {
    if tool_sessions.is_empty() {
        return None;
    }

    let mut moods: GroupedAccumulator<Vec<f64>> = GroupedAccumulator::default();
    let mut engagement = EngagementAccumulator::default();

    for event in tool_sessions {
        engagement.record(event);

        if let Some(session) = ToolSession::from_event(event) {
            if let Some(impact) = session.mood_impact {
                moods.entry(session.tool_id).push(impact);
            }
        }
    }

    let mood_improvement_by_tool: BTreeMap<String, f64> = moods
        .into_iter()
        .filter(|(_, samples)| samples.len() >= min_samples)
        .filter_map(|(tool, samples)| {
            // Filter after rounding so no tool is reported as 0.0.
            let avg = round_to(mean(&samples)?, 3);
            (avg > 0.0).then_some((tool, avg))
        })
        .collect();

    let streaks: Vec<f64> = streak_milestones
        .iter()
        .filter_map(|e| e.prop_f64("streak_days"))
        .collect();

    Some(EffectivenessStats {
        mood_improvement_by_tool,
        average_streak_length: mean(&streaks)
            .map(|avg| round_to(avg, 1))
            .unwrap_or(DEFAULT_STREAK_LENGTH),
        peak_engagement_hour: engagement.hours.peak().unwrap_or(DEFAULT_PEAK_HOUR),
        weekend_weekday_ratio: engagement.weekend_ratio(),
        retention_7_day: RETENTION_7_DAY,
        retention_30_day: RETENTION_30_DAY,
        sample_size: engagement.sessions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{event, event_at};
    use crate::analysis::tools::TOOL_SESSION_COMPLETED;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn mood_sessions(tool: &str, count: usize, impact: f64) -> Vec<Event> {
        (0..count)
            .map(|i| {
                event(
                    TOOL_SESSION_COMPLETED,
                    &format!("u{}", i),
                    json!({"tool_id": tool, "mood_impact": impact}),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_sessions_yield_none() {
        assert_eq!(aggregate_effectiveness(&[], &[], 20), None);
    }

    #[test]
    fn test_mood_map_excludes_small_and_non_positive() {
        let mut sessions = mood_sessions("box_breathing", 20, 1.25);
        sessions.extend(mood_sessions("cold_shower", 25, -0.5));
        sessions.extend(mood_sessions("doom_scroll_check", 30, 0.0));
        sessions.extend(mood_sessions("gratitude_list", 19, 3.0));

        let stats = aggregate_effectiveness(&sessions, &[], 20).unwrap();
        assert_eq!(stats.mood_improvement_by_tool.len(), 1);
        assert_eq!(stats.mood_improvement_by_tool.get("box_breathing"), Some(&1.25));
        assert_eq!(stats.sample_size, 94);
    }

    #[test]
    fn test_mood_map_excludes_averages_that_round_to_zero() {
        let mut sessions = mood_sessions("t", 20, 0.0004);
        sessions.extend(mood_sessions("sun_salute", 20, 0.0006));

        let stats = aggregate_effectiveness(&sessions, &[], 20).unwrap();
        assert_eq!(stats.mood_improvement_by_tool.get("t"), None);
        assert_eq!(stats.mood_improvement_by_tool.get("sun_salute"), Some(&0.001));
        assert!(stats.mood_improvement_by_tool.values().all(|&avg| avg > 0.0));
    }

    #[test]
    fn test_fallbacks() {
        let sessions = mood_sessions("box_breathing", 3, 1.0);
        let stats = aggregate_effectiveness(&sessions, &[], 20).unwrap();

        assert_eq!(stats.average_streak_length, DEFAULT_STREAK_LENGTH);
        assert_eq!(stats.peak_engagement_hour, DEFAULT_PEAK_HOUR);
        assert_eq!(stats.weekend_weekday_ratio, DEFAULT_WEEKEND_RATIO);
        assert_eq!(stats.retention_7_day, RETENTION_7_DAY);
        assert_eq!(stats.retention_30_day, RETENTION_30_DAY);
    }

    #[test]
    fn test_engagement_patterns() {
        // 2026-10-17 is a Saturday, 2026-10-19 a Monday.
        let saturday = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2026, 10, 19, 20, 0, 0).unwrap();

        let mut sessions = Vec::new();
        for i in 0..3 {
            sessions.push(event_at(TOOL_SESSION_COMPLETED, &format!("a{}", i), saturday, json!({"tool_id": "walk"})));
        }
        for i in 0..4 {
            sessions.push(event_at(TOOL_SESSION_COMPLETED, &format!("b{}", i), monday, json!({"tool_id": "walk"})));
        }

        let streaks = vec![
            event(STREAK_MILESTONE, "a0", json!({"streak_days": 7})),
            event(STREAK_MILESTONE, "a1", json!({"streak_days": 30})),
            event(STREAK_MILESTONE, "a2", json!({})),
        ];

        let stats = aggregate_effectiveness(&sessions, &streaks, 20).unwrap();
        assert_eq!(stats.weekend_weekday_ratio, 0.75);
        assert_eq!(stats.peak_engagement_hour, 20);
        assert_eq!(stats.average_streak_length, 18.5);
        assert!(stats.mood_improvement_by_tool.is_empty());
    }

    #[test]
    fn test_peak_hour_tie_keeps_first_seen() {
        let early = Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 10, 19, 22, 0, 0).unwrap();
        let sessions = vec![
            event_at(TOOL_SESSION_COMPLETED, "a", late, json!({"tool_id": "t"})),
            event_at(TOOL_SESSION_COMPLETED, "b", early, json!({"tool_id": "t"})),
            event_at(TOOL_SESSION_COMPLETED, "c", early, json!({"tool_id": "t"})),
            event_at(TOOL_SESSION_COMPLETED, "d", late, json!({"tool_id": "t"})),
        ];

        let stats = aggregate_effectiveness(&sessions, &[], 20).unwrap();
        assert_eq!(stats.peak_engagement_hour, 22);
    }
}
