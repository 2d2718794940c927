//! Decision prompt rendering.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::goals::role_goals;
use crate::core::summary::summarize_actor;
use crate::core::types::{ActionName, JobStatus, OfferStatus, Role};
use crate::core::world::{Actor, WorldState};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const DECISION_TEMPLATE: &str = include_str!("prompts/decision.md");

/// Records listed per section before the prompt stops enumerating.
const MAX_LISTED: usize = 8;
const RECENT_ACTIONS: usize = 5;

/// Rendered prompt pair for one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionPrompt {
    pub system: String,
    pub user: String,
}

struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("decision", DECISION_TEMPLATE)
            .expect("decision template should be valid");
        Self { env }
    }
}

pub fn build_decision_prompt(
    state: &WorldState,
    actor: &Actor,
    available: &BTreeSet<ActionName>,
) -> Result<DecisionPrompt> {
    let engine = PromptEngine::new();
    let summary = summarize_actor(state, actor);

    let system = engine
        .env
        .get_template("system")?
        .render(context! {
            display_name => actor.display_name.as_str(),
            role_label => role_label(actor.role),
        })
        .context("render system prompt")?;

    let actions: Vec<&str> = available.iter().map(|action| action.as_str()).collect();
    let recent: Vec<String> = state
        .history
        .iter()
        .rev()
        .filter(|record| record.actor_id == actor.id)
        .take(RECENT_ACTIONS)
        .map(|record| match &record.error {
            Some(error) => format!("{} failed: {error}", record.action),
            None => format!("{} succeeded", record.action),
        })
        .collect();

    let user = engine
        .env
        .get_template("decision")?
        .render(context! {
            actor_id => actor.id.as_str(),
            role => actor.role.as_str(),
            goals => role_goals(actor.role),
            summary => summary.render(),
            candidates => candidate_lines(state, actor),
            actions => actions,
            recent => recent,
        })
        .context("render decision prompt")?;

    debug!(actor_id = %actor.id, prompt_bytes = user.len(), "rendered decision prompt");
    Ok(DecisionPrompt { system, user })
}

/// Short lines naming the ids an actor could reference.
fn candidate_lines(state: &WorldState, actor: &Actor) -> Vec<String> {
    let mut lines = Vec::new();
    if actor.role.is_job_poster() {
        lines.extend(state.jobs_posted_by(&actor.id).take(MAX_LISTED).map(|job| {
            format!(
                "job {} \"{}\" [{}] {:?} budget {:.2}",
                job.id, job.title, job.category, job.status, job.budget
            )
        }));
        lines.extend(
            state
                .applications_received(&actor.id)
                .take(MAX_LISTED)
                .map(|application| {
                    format!(
                        "application {} on job {} from {} cost {:.2} status {}",
                        application.id,
                        application.job_id,
                        application.applicant_id,
                        application.estimated_cost,
                        application.status.code()
                    )
                }),
        );
        lines.extend(
            state
                .offers
                .iter()
                .filter(|offer| offer.poster_id == actor.id)
                .take(MAX_LISTED)
                .map(|offer| {
                    format!(
                        "offer {} on job {} {}",
                        offer.id,
                        offer.job_id,
                        offer.status.as_str()
                    )
                }),
        );
    } else if actor.role.is_service_provider() {
        lines.extend(
            state
                .jobs
                .iter()
                .filter(|job| job.status == JobStatus::Open && job.poster_id != actor.id)
                .filter(|job| !state.has_applied(&actor.id, &job.id))
                .take(MAX_LISTED)
                .map(|job| {
                    format!(
                        "open job {} \"{}\" [{}] budget {:.2}",
                        job.id, job.title, job.category, job.budget
                    )
                }),
        );
        lines.extend(
            state
                .offers_addressed_to(&actor.id, OfferStatus::Pending)
                .take(MAX_LISTED)
                .map(|offer| {
                    format!(
                        "pending offer {} on job {} budget {:.2}",
                        offer.id, offer.job_id, offer.budget
                    )
                }),
        );
    }
    lines
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::JobPosterIndividual => "homeowner hiring help",
        Role::JobPosterOrganization => "business hiring contractors",
        Role::ServiceProvider => "service provider looking for work",
        Role::Admin => "marketplace administrator",
        Role::Viewer => "read-only viewer",
    }
}
