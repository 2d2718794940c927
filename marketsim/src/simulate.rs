//! Simulation loop: provision actors, run shuffled turns until a stop
//! condition, clean up and finalize.
//!
//! ```text
//! idle -> running -> completed   goals met, or iteration cap reached
//!                 -> failed      error ceiling exceeded
//! idle -> failed                 minimum role mix could not be provisioned
//! ```

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::goals::{GoalCounts, goals_met};
use crate::core::report::{FinalReport, StopReason, finalize};
use crate::core::types::RunStatus;
use crate::core::world::WorldState;
use crate::decide::{LlmAdvisor, decide};
use crate::execute::{Backends, execute};
use crate::io::config::SimConfig;
use crate::io::decision::DecisionService;

/// Per-actor bookkeeping that lives only for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnBook {
    /// Iteration of the last successful action (0 before any).
    pub last_productive: u32,
    /// World revision observed when the actor was last found with nothing to do.
    pub waiting_since: Option<u64>,
}

impl TurnBook {
    /// A waiting actor is skipped once it has been idle for more than
    /// `max_wait_cycles` iterations, until the world changes under it.
    pub fn should_skip(&self, iteration: u32, max_wait_cycles: u32, revision: u64) -> bool {
        match self.waiting_since {
            Some(seen) => {
                iteration.saturating_sub(self.last_productive) > max_wait_cycles && seen == revision
            }
            None => false,
        }
    }
}

/// Progress snapshot handed to the `on_iteration` callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationSummary {
    pub iteration: u32,
    pub turns: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub waiting: usize,
    pub skipped: usize,
    pub errors: usize,
    pub counts: GoalCounts,
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub state: WorldState,
    pub report: FinalReport,
    /// Identities that could not be destroyed during cleanup.
    pub cleanup_failures: usize,
}

/// Run one simulation to a terminal state.
///
/// Returns `Err` only for invalid configuration; every run-time failure is
/// reflected in the returned report instead.
#[instrument(
    skip_all,
    fields(max_iterations = config.run.max_iterations, llm = decision.is_some())
)]
pub fn run_simulation<R: Rng>(
    config: &SimConfig,
    backends: Backends<'_>,
    decision: Option<&dyn DecisionService>,
    rng: &mut R,
    on_iteration: &mut dyn FnMut(&IterationSummary),
) -> Result<SimulationOutcome> {
    config.validate()?;
    let advisor = decision.map(|service| LlmAdvisor {
        service,
        temperature: config.llm.temperature,
    });

    let mut state = WorldState::default();
    provision(&mut state, config, backends);

    let posters = state
        .actors
        .iter()
        .filter(|actor| actor.role.is_job_poster())
        .count();
    let providers = state
        .actors
        .iter()
        .filter(|actor| actor.role.is_service_provider())
        .count();
    if posters == 0 || providers == 0 {
        warn!(posters, providers, "minimum role mix not provisioned");
        let stop = StopReason::InsufficientActors { posters, providers };
        return Ok(wind_down(state, config, backends, 0, stop));
    }

    state.status = RunStatus::Running;
    info!(actors = state.actors.len(), "simulation running");

    let mut books: BTreeMap<String, TurnBook> = BTreeMap::new();
    let delay = Duration::from_millis(config.run.turn_delay_ms);
    let mut iteration = 0u32;

    let stop = 'run: loop {
        iteration += 1;
        let mut summary = IterationSummary {
            iteration,
            turns: 0,
            succeeded: 0,
            failed: 0,
            waiting: 0,
            skipped: 0,
            errors: 0,
            counts: GoalCounts::default(),
        };

        let mut order: Vec<usize> = (0..state.actors.len()).collect();
        order.shuffle(rng);

        for index in order {
            let actor = state.actors[index].clone();
            let book = books.entry(actor.id.clone()).or_default();
            if book.should_skip(iteration, config.run.max_wait_cycles, state.revision()) {
                debug!(actor_id = %actor.id, "skipping stalled actor");
                summary.skipped += 1;
                continue;
            }

            let Some(decision) = decide(&state, &actor, &config.job_catalog, advisor, rng) else {
                book.waiting_since = Some(state.revision());
                summary.waiting += 1;
                continue;
            };
            book.waiting_since = None;

            let record = execute(&mut state, &actor, &decision, backends);
            summary.turns += 1;
            if record.success {
                book.last_productive = iteration;
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if !delay.is_zero() {
                thread::sleep(delay);
            }

            if state.errors.len() > config.run.error_ceiling {
                summary.errors = state.errors.len();
                summary.counts = GoalCounts::from_state(&state);
                on_iteration(&summary);
                break 'run StopReason::ErrorCeiling {
                    errors: state.errors.len(),
                    ceiling: config.run.error_ceiling,
                };
            }
            if goals_met(&state, &config.goals) {
                summary.errors = state.errors.len();
                summary.counts = GoalCounts::from_state(&state);
                on_iteration(&summary);
                break 'run StopReason::GoalsMet;
            }
        }

        summary.errors = state.errors.len();
        summary.counts = GoalCounts::from_state(&state);
        debug!(?summary, "iteration finished");
        on_iteration(&summary);

        if iteration >= config.run.max_iterations {
            break StopReason::MaxIterations {
                max_iterations: config.run.max_iterations,
            };
        }
    };

    Ok(wind_down(state, config, backends, iteration, stop))
}

fn provision(state: &mut WorldState, config: &SimConfig, backends: Backends<'_>) {
    for (role, count) in config.actors.plan() {
        for ordinal in 0..count {
            match backends.identities.create_identity(role, ordinal) {
                Ok(actor) => {
                    debug!(actor_id = %actor.id, %role, "actor provisioned");
                    state.log(format!("{} joined as {role}", actor.display_name));
                    state.add_actor(actor);
                }
                Err(err) => {
                    warn!(%role, ordinal, err = %err, "identity provisioning failed");
                    state.log_error(format!("provision {role} #{ordinal} failed: {err:#}"));
                }
            }
        }
    }
}

/// Terminal bookkeeping shared by every exit path.
fn wind_down(
    mut state: WorldState,
    config: &SimConfig,
    backends: Backends<'_>,
    iterations: u32,
    stop: StopReason,
) -> SimulationOutcome {
    state.status = stop.run_status();
    info!(status = ?state.status, ?stop, iterations, "simulation stopped");

    let cleanup_failures = if config.run.skip_cleanup {
        0
    } else {
        cleanup(&mut state, backends)
    };
    let report = finalize(&state, &config.goals, iterations, stop);
    SimulationOutcome {
        state,
        report,
        cleanup_failures,
    }
}

/// Destroy every provisioned identity. Failures are logged, not fatal.
fn cleanup(state: &mut WorldState, backends: Backends<'_>) -> usize {
    let mut failures = 0;
    let actors = state.actors.clone();
    for actor in &actors {
        if let Err(err) = backends.identities.destroy_identity(actor) {
            failures += 1;
            warn!(actor_id = %actor.id, err = %err, "identity cleanup failed");
            state.log(format!("cleanup of {} failed: {err:#}", actor.id));
        }
    }
    info!(destroyed = actors.len() - failures, failures, "cleanup finished");
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_actor_is_never_skipped() {
        assert!(!TurnBook::default().should_skip(10, 3, 0));
    }

    #[test]
    fn waiting_actor_is_skipped_after_wait_cycles_until_world_changes() {
        let book = TurnBook {
            last_productive: 1,
            waiting_since: Some(7),
        };
        assert!(!book.should_skip(4, 3, 7));
        assert!(book.should_skip(5, 3, 7));
        assert!(!book.should_skip(5, 3, 8));
    }
}
