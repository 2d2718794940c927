//! Final run report produced by the finalize step.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::goals::{GoalAttainment, GoalCounts, goal_attainment};
use crate::core::types::{GoalThresholds, Role, RunStatus};
use crate::core::world::WorldState;

/// Errors beyond this many are summarized rather than listed.
pub const MAX_REPORTED_ERRORS: usize = 10;
/// Each reported error is cut to this many characters.
pub const MAX_ERROR_CHARS: usize = 200;

/// Why the simulation loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Every goal threshold was met.
    GoalsMet,
    /// The iteration cap was reached first.
    MaxIterations { max_iterations: u32 },
    /// Recorded errors exceeded the ceiling.
    ErrorCeiling { errors: usize, ceiling: usize },
    /// Not enough posters or providers could be provisioned.
    InsufficientActors { posters: usize, providers: usize },
}

impl StopReason {
    pub fn run_status(&self) -> RunStatus {
        match self {
            StopReason::GoalsMet | StopReason::MaxIterations { .. } => RunStatus::Completed,
            StopReason::ErrorCeiling { .. } | StopReason::InsufficientActors { .. } => {
                RunStatus::Failed
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorActivity {
    pub actor_id: String,
    pub role: Role,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub by_action: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalReport {
    pub status: RunStatus,
    pub stop: StopReason,
    pub iterations: u32,
    pub counts: GoalCounts,
    pub goals: GoalThresholds,
    pub attainment: GoalAttainment,
    pub goals_met: bool,
    pub actors: Vec<ActorActivity>,
    pub error_count: usize,
    pub errors: Vec<String>,
}

/// Build the report from the final state. Pure; runs for every terminal state.
pub fn finalize(
    state: &WorldState,
    goals: &GoalThresholds,
    iterations: u32,
    stop: StopReason,
) -> FinalReport {
    let attainment = goal_attainment(state, goals);
    let actors = state
        .actors
        .iter()
        .map(|actor| {
            let mut activity = ActorActivity {
                actor_id: actor.id.clone(),
                role: actor.role,
                attempted: 0,
                succeeded: 0,
                failed: 0,
                by_action: BTreeMap::new(),
            };
            for record in state.history.iter().filter(|r| r.actor_id == actor.id) {
                activity.attempted += 1;
                if record.success {
                    activity.succeeded += 1;
                } else {
                    activity.failed += 1;
                }
                *activity
                    .by_action
                    .entry(record.action.to_string())
                    .or_insert(0) += 1;
            }
            activity
        })
        .collect();

    FinalReport {
        status: stop.run_status(),
        stop,
        iterations,
        counts: GoalCounts::from_state(state),
        goals: *goals,
        goals_met: attainment.all(),
        attainment,
        actors,
        error_count: state.errors.len(),
        errors: truncate_errors(&state.errors),
    }
}

fn truncate_errors(errors: &[String]) -> Vec<String> {
    let mut shown: Vec<String> = errors
        .iter()
        .take(MAX_REPORTED_ERRORS)
        .map(|err| {
            if err.chars().count() > MAX_ERROR_CHARS {
                let cut: String = err.chars().take(MAX_ERROR_CHARS).collect();
                format!("{cut}...")
            } else {
                err.clone()
            }
        })
        .collect();
    if errors.len() > MAX_REPORTED_ERRORS {
        shown.push(format!(
            "... and {} more",
            errors.len() - MAX_REPORTED_ERRORS
        ));
    }
    shown
}
