//! Tool usage and tool category statistics.

use super::aggregator::{mean, rate, round_to, GroupedAccumulator, PeakCounter};
use crate::config::Thresholds;
use crate::models::{Event, ToolCategoryStat, ToolStat};
use std::collections::HashSet;

pub const TOOL_SESSION_COMPLETED: &str = "tool_session_completed";

/// Typed view over the properties of a tool session event.
#[derive(Debug, Clone, Copy)]
pub struct ToolSession<'a> {
    pub tool_id: &'a str,
    pub category: Option<&'a str>,
    pub user: &'a str,
    pub duration_seconds: Option<f64>,
    pub completed: bool,
    pub mood_impact: Option<f64>,
    pub hour: Option<u32>,
}

/// Category of a session event, from `tool_category` or `category`.
pub fn session_category(event: &Event) -> Option<&str> {
    event
        .prop_str("tool_category")
        .or_else(|| event.prop_str("category"))
}

/// Non-negative session length in seconds.
pub fn session_duration(event: &Event) -> Option<f64> {
    event.prop_f64("duration_seconds").filter(|d| *d >= 0.0)
}

impl<'a> ToolSession<'a> {
    /// Returns `None` for events without a `tool_id`.
    pub fn from_event(event: &'a Event) -> Option<Self> {
        let tool_id = event.prop_str("tool_id")?;

        let mood_impact = event.prop_f64("mood_impact").or_else(|| {
            let before = event.prop_f64("mood_before")?;
            let after = event.prop_f64("mood_after")?;
            Some(after - before)
        });

        Some(Self {
            tool_id,
            category: session_category(event),
            user: event.distinct_id.as_str(),
            duration_seconds: session_duration(event),
            completed: event.prop_flag("completed"),
            mood_impact,
            hour: event.hour_of_day(),
        })
    }
}

/// Running totals for one tool.
#[derive(Debug, Default)]
struct ToolAccumulator {
    category: Option<String>,
    sessions: u64,
    users: HashSet<String>,
    durations: Vec<f64>,
    completions: u64,
    mood_impacts: Vec<f64>,
    hours: PeakCounter<u32>,
}

impl ToolAccumulator {
    fn record(&mut self, session: &ToolSession<'_>) {
        self.sessions += 1;
        self.users.insert(session.user.to_string());
        if self.category.is_none() {
            self.category = session.category.map(String::from);
        }
        if let Some(duration) = session.duration_seconds {
            self.durations.push(duration);
        }
        if session.completed {
            self.completions += 1;
        }
        if let Some(impact) = session.mood_impact {
            self.mood_impacts.push(impact);
        }
        if let Some(hour) = session.hour {
            self.hours.record(hour);
        }
    }

    fn is_reportable(&self, thresholds: &Thresholds) -> bool {
        self.sessions as usize >= thresholds.min_tool_sessions
            && self.users.len() >= thresholds.min_tool_users
    }

    fn to_stat(&self, tool_id: &str) -> ToolStat {
        ToolStat {
            tool_id: tool_id.to_string(),
            tool_category: self.category.clone(),
            total_sessions: self.sessions,
            unique_users: self.users.len() as u64,
            completion_rate: round_to(rate(self.completions, self.sessions), 3),
            average_duration_seconds: mean(&self.durations).map(|avg| avg as u64),
            average_mood_impact: mean(&self.mood_impacts).map(|avg| round_to(avg, 3)),
            peak_usage_hour: self.hours.peak(),
        }
    }
}

/// Running totals for one category, fed from its tools.
#[derive(Debug, Default)]
struct CategoryAccumulator {
    sessions: u64,
    completions: u64,
    mood_impacts: Vec<f64>,
    most_popular: Option<(String, u64)>,
}

impl CategoryAccumulator {
    fn absorb(&mut self, tool_id: &str, tool: &ToolAccumulator) {
        self.sessions += tool.sessions;
        self.completions += tool.completions;
        self.mood_impacts.extend_from_slice(&tool.mood_impacts);

        // Strictly greater: an earlier tool keeps the lead on a tie.
        let leads = match self.most_popular {
            Some((_, best)) => tool.sessions > best,
            None => true,
        };
        if leads {
            self.most_popular = Some((tool_id.to_string(), tool.sessions));
        }
    }

    fn into_stat(self, category: String) -> ToolCategoryStat {
        ToolCategoryStat {
            category,
            total_sessions: self.sessions,
            completion_rate: round_to(rate(self.completions, self.sessions), 3),
            average_mood_impact: mean(&self.mood_impacts).map(|avg| round_to(avg, 3)),
            most_popular_tool: self.most_popular.map(|(tool, _)| tool),
        }
    }
}

/// Reportable tools and categories.
#[derive(Debug, Default)]
pub struct ToolUsage {
    pub tools: Vec<ToolStat>,
    pub categories: Vec<ToolCategoryStat>,
}

/// Group tool sessions by tool and by category.
///
/// Category totals include every tool in the category, whether or not the
/// tool itself cleared the per-tool threshold.
pub fn aggregate_tool_usage(sessions: &[Event], thresholds: &Thresholds) -> ToolUsage {
    let mut tools: GroupedAccumulator<ToolAccumulator> = GroupedAccumulator::default();

    for session in sessions.iter().filter_map(ToolSession::from_event) {
        tools.entry(session.tool_id).record(&session);
    }

    let mut categories: GroupedAccumulator<CategoryAccumulator> = GroupedAccumulator::default();
    for (tool_id, tool) in tools.iter() {
        if let Some(ref category) = tool.category {
            categories.entry(category).absorb(tool_id, tool);
        }
    }

    let tool_stats = tools
        .iter()
        .filter(|(_, tool)| tool.is_reportable(thresholds))
        .map(|(tool_id, tool)| tool.to_stat(tool_id))
        .collect();

    let category_stats = categories
        .into_iter()
        .filter(|(_, cat)| cat.sessions as usize >= thresholds.min_category_sessions)
        .map(|(category, cat)| cat.into_stat(category))
        .collect();

    ToolUsage {
        tools: tool_stats,
        categories: category_stats,
    }
}
