//! Test-only builders for world entities and scripted collaborators.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::core::types::{ActionName, ApplicationStatus, JobStatus, OfferStatus, Role};
use crate::core::world::{ActionRecord, Actor, Application, Job, Offer, Review};
use crate::io::decision::{ChatOptions, DecisionService};

/// Fixed timestamp so builders produce comparable values.
fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

pub fn actor(id: &str, role: Role) -> Actor {
    Actor {
        id: id.to_string(),
        role,
        display_name: format!("{id} name"),
        identity_ref: format!("idp|{id}"),
        profile_ref: role.is_service_provider().then(|| format!("profile-{id}")),
        session: format!("session-{id}"),
    }
}

pub fn poster(id: &str) -> Actor {
    actor(id, Role::JobPosterIndividual)
}

pub fn provider(id: &str) -> Actor {
    actor(id, Role::ServiceProvider)
}

/// An OPEN plumbing job.
pub fn job(id: &str, poster_id: &str, budget: f64) -> Job {
    Job {
        id: id.to_string(),
        title: format!("{id} title"),
        category: "Plumbing".to_string(),
        status: JobStatus::Open,
        poster_id: poster_id.to_string(),
        budget,
        created_at: fixed_time(),
    }
}

/// An application still under review (`UR`).
pub fn application(id: &str, job_id: &str, applicant_id: &str, estimated_cost: f64) -> Application {
    Application {
        id: id.to_string(),
        job_id: job_id.to_string(),
        applicant_id: applicant_id.to_string(),
        profile_ref: Some(format!("profile-{applicant_id}")),
        status: ApplicationStatus::UnderReview,
        estimated_cost,
        created_at: fixed_time(),
    }
}

pub fn offer(
    id: &str,
    job_id: &str,
    poster_id: &str,
    provider_id: &str,
    status: OfferStatus,
) -> Offer {
    Offer {
        id: id.to_string(),
        job_id: job_id.to_string(),
        application_id: None,
        poster_id: poster_id.to_string(),
        provider_id: provider_id.to_string(),
        status,
        budget: 250.0,
        created_at: fixed_time(),
    }
}

pub fn review(id: &str, offer_id: &str, reviewer_id: &str, rating: u8) -> Review {
    Review {
        id: id.to_string(),
        offer_id: offer_id.to_string(),
        reviewer_id: reviewer_id.to_string(),
        rating,
        feedback: "Good work.".to_string(),
        created_at: fixed_time(),
    }
}

/// A history entry for a job poster.
pub fn record(actor_id: &str, action: ActionName, success: bool) -> ActionRecord {
    ActionRecord {
        role: Role::JobPosterIndividual,
        action,
        actor_id: actor_id.to_string(),
        success,
        error: (!success).then(|| format!("{action} failed")),
        result: None,
        at: fixed_time(),
    }
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Replies with canned responses in order and records every prompt it sees.
pub struct ScriptedDecisionService {
    replies: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedDecisionService {
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(str::to_string).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl DecisionService for ScriptedDecisionService {
    fn chat(&self, prompt: &str, _options: &ChatOptions) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.replies.borrow_mut().pop_front() {
            Some(reply) => Ok(reply),
            None => bail!("scripted decision service has no replies left"),
        }
    }
}

/// Always unreachable.
pub struct FailingDecisionService;

impl DecisionService for FailingDecisionService {
    fn chat(&self, _prompt: &str, _options: &ChatOptions) -> Result<String> {
        bail!("decision service unreachable")
    }
}
