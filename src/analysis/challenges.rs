//! Challenge completion rates.

use super::aggregator::{mean, rate, round_to, GroupedAccumulator};
use crate::models::{ChallengeStat, Event};

pub const CHALLENGE_STARTED: &str = "challenge_started";
pub const CHALLENGE_COMPLETED: &str = "challenge_completed";

/// Running totals for one challenge.
#[derive(Debug, Default)]
struct ChallengeAccumulator {
    starts: u64,
    completions: u64,
    completion_days: Vec<f64>,
}

impl ChallengeAccumulator {
    fn record_start(&mut self) {
        self.starts += 1;
    }

    fn record_completion(&mut self, event: &Event) {
        self.completions += 1;
        if let Some(days) = event.prop_f64("days_to_complete").filter(|d| *d != 0.0) {
            self.completion_days.push(days);
        }
    }

    fn into_stat(self, challenge_id: &str) -> ChallengeStat {
        // Truncated like the app's whole-day display; a zero average is dropped.
        let average_days = mean(&self.completion_days)
            .map(|avg| avg.max(0.0) as u64)
            .filter(|days| *days != 0);

        ChallengeStat {
            challenge_id: challenge_id.to_string(),
            completion_rate: round_to(rate(self.completions, self.starts), 3),
            total_starts: self.starts,
            total_completions: self.completions,
            average_days_to_complete: average_days,
        }
    }
}

/// Completion stats for the known challenges, in catalogue order.
///
/// Challenges nobody started in the window are left out.
pub fn aggregate_challenges(
    challenge_ids: &[String],
    started: &[Event],
    completed: &[Event],
) -> Vec<ChallengeStat> {
    let mut groups: GroupedAccumulator<ChallengeAccumulator> = GroupedAccumulator::default();

    for event in started {
        if let Some(id) = event.prop_str("challenge_id") {
            groups.entry(id).record_start();
        }
    }

    for event in completed {
        if let Some(id) = event.prop_str("challenge_id") {
            groups.entry(id).record_completion(event);
        }
    }

    let mut by_id: std::collections::HashMap<String, ChallengeAccumulator> =
        groups.into_iter().collect();

    challenge_ids
        .iter()
        .filter_map(|id| {
            let acc = by_id.remove(id)?;
            if acc.starts == 0 {
                return None;
            }
            Some(acc.into_stat(id))
        })
        .collect()
}
