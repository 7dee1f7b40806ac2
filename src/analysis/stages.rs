//! Stage progression statistics.

use super::aggregator::{mean, round_to, GroupedAccumulator};
use crate::models::{Event, StageStat};
use std::collections::HashSet;

pub const STAGE_ADVANCED: &str = "stage_advanced";

/// Used when nobody has left a stage yet.
pub const DEFAULT_DAYS_IN_STAGE: f64 = 14.0;

#[derive(Debug, Default)]
struct StageAccumulator {
    reached: HashSet<String>,
    completed: HashSet<String>,
    days_in_stage: Vec<f64>,
}

impl StageAccumulator {
    fn into_stat(self, stage: String) -> StageStat {
        let average_days = mean(&self.days_in_stage)
            .map(|avg| round_to(avg, 1))
            .unwrap_or(DEFAULT_DAYS_IN_STAGE);

        StageStat {
            stage,
            users_reached: self.reached.len() as u64,
            users_completed: self.completed.len() as u64,
            average_days_in_stage: average_days,
            top_tools: Vec::new(),
            top_challenges: Vec::new(),
        }
    }
}

/// Group stage advancements by the stage entered and the stage left.
///
/// A stage is reported once at least `min_users` distinct users reached it.
pub fn aggregate_stages(advancements: &[Event], min_users: usize) -> Vec<StageStat> {
    let mut stages: GroupedAccumulator<StageAccumulator> = GroupedAccumulator::default();

    for event in advancements {
        let user = event.distinct_id.as_str();

        if let Some(to_stage) = event.prop_str("to_stage") {
            stages.entry(to_stage).reached.insert(user.to_string());
        }

        if let Some(from_stage) = event.prop_str("from_stage") {
            let stage = stages.entry(from_stage);
            stage.completed.insert(user.to_string());
            if let Some(days) = event
                .prop_f64("days_in_previous_stage")
                .filter(|d| *d >= 0.0)
            {
                stage.days_in_stage.push(days);
            }
        }
    }

    stages
        .into_iter()
        .filter(|(_, stage)| stage.reached.len() >= min_users)
        .map(|(name, stage)| stage.into_stat(name))
        .collect()
}
