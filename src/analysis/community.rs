//! Same-day and same-week community activity.
//!
//! The whole family is withheld when too few people were active today;
//! sparse numbers read badly as social proof.

use super::tools::{session_category, session_duration};
use crate::models::{CommunityStats, Event};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashSet;

pub const MILESTONE_COMPLETED: &str = "milestone_completed";
pub const JOURNAL_ENTRY_CREATED: &str = "journal_entry_created";

const MEDITATION_CATEGORY: &str = "meditation";

/// Event lists the community family reads.
#[derive(Debug, Clone, Copy)]
pub struct CommunityEvents<'a> {
    pub tool_sessions: &'a [Event],
    pub challenge_completions: &'a [Event],
    pub milestones: &'a [Event],
    pub journal_entries: &'a [Event],
}

/// Today and the trailing week (today plus the six days before), in UTC.
#[derive(Debug, Clone, Copy)]
struct Window {
    today: NaiveDate,
    week_start: NaiveDate,
}

impl Window {
    fn ending(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            today,
            week_start: today - Duration::days(6),
        }
    }

    fn is_today(&self, event: &Event) -> bool {
        event
            .timestamp
            .is_some_and(|ts| ts.date_naive() == self.today)
    }

    fn is_this_week(&self, event: &Event) -> bool {
        event.timestamp.is_some_and(|ts| {
            let date = ts.date_naive();
            date >= self.week_start && date <= self.today
        })
    }
}

#[derive(Debug, Default)]
struct CommunityAccumulator {
    users_today: HashSet<String>,
    users_week: HashSet<String>,
    meditation_seconds_today: f64,
}

impl CommunityAccumulator {
    fn record_session(&mut self, event: &Event, window: &Window) {
        if window.is_this_week(event) {
            self.users_week.insert(event.distinct_id.clone());
        }
        if !window.is_today(event) {
            return;
        }
        self.users_today.insert(event.distinct_id.clone());

        // Any meditation session counts, with or without a tool id.
        if session_category(event) == Some(MEDITATION_CATEGORY) {
            self.meditation_seconds_today += session_duration(event).unwrap_or(0.0);
        }
    }
}

/// Community activity as of `now`, or `None` below `min_users` active today.
pub fn aggregate_community(
    events: CommunityEvents<'_>,
    now: DateTime<Utc>,
    min_users: usize,
) -> Option<CommunityStats> {
    let window = Window::ending(now);

    let mut acc = CommunityAccumulator::default();
    for event in events.tool_sessions {
        acc.record_session(event, &window);
    }

    if acc.users_today.len() < min_users {
        return None;
    }

    Some(CommunityStats {
        active_users_today: acc.users_today.len() as u64,
        active_users_this_week: acc.users_week.len() as u64,
        challenges_completed_today: count_where(events.challenge_completions, |e| {
            window.is_today(e)
        }),
        challenges_completed_this_week: count_where(events.challenge_completions, |e| {
            window.is_this_week(e)
        }),
        milestones_today: count_where(events.milestones, |e| window.is_today(e)),
        // Whole minutes, truncated.
        meditation_minutes_today: acc.meditation_seconds_today as u64 / 60,
        journal_entries_today: count_where(events.journal_entries, |e| window.is_today(e)),
    })
}

fn count_where(events: &[Event], pred: impl Fn(&Event) -> bool) -> u64 {
    events.iter().filter(|e| pred(e)).count() as u64
}
