//! Deterministic action policy: per-role priority tables and parameter synthesis.
//!
//! This is the fallback half of the action policy. It must always produce a
//! decision when the availability set is non-empty, so every function here is
//! total over reachable world states. Randomness only shapes synthesized
//! numbers and template choice, never which action wins.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::core::availability::first_open_job_for;
use crate::core::catalog::JobTemplate;
use crate::core::types::{ActionName, ApplicationStatus, JobStatus, OfferStatus, Role};
use crate::core::world::{Actor, WorldState};

const POSTER_PRIORITY: &[ActionName] = &[
    ActionName::LeaveReview,
    ActionName::CompleteJob,
    ActionName::MakeOffer,
    ActionName::Shortlist,
    ActionName::ViewApplications,
    ActionName::CreateJob,
];

const PROVIDER_PRIORITY: &[ActionName] = &[
    ActionName::AcceptOffer,
    ActionName::ApplyToJob,
    ActionName::BrowseJobs,
    ActionName::ViewOffers,
    ActionName::ViewReviews,
    ActionName::RejectOffer,
];

const REVIEW_FEEDBACK: &[&str] = &[
    "Arrived on time and the work was spotless.",
    "Great communication throughout, would hire again.",
    "Solid work at a fair price.",
    "Quick, tidy and professional.",
];

/// Organization posters run bigger jobs than individuals.
const ORGANIZATION_BUDGET_FACTOR: f64 = 1.5;

/// Concrete, already-resolved parameters for one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionParams {
    CreateJob {
        title: String,
        category: String,
        budget: f64,
        description: String,
    },
    ViewApplications {
        job_id: String,
    },
    Shortlist {
        application_id: String,
    },
    MakeOffer {
        job_id: String,
        application_id: String,
        provider_id: String,
        budget: f64,
    },
    CompleteJob {
        offer_id: String,
    },
    LeaveReview {
        offer_id: String,
        rating: u8,
        feedback: String,
    },
    BrowseJobs {
        category: Option<String>,
    },
    ApplyToJob {
        job_id: String,
        estimated_cost: f64,
        cover_note: String,
    },
    ViewOffers {
        status: Option<OfferStatus>,
    },
    AcceptOffer {
        offer_id: String,
    },
    RejectOffer {
        offer_id: String,
    },
    ViewReviews,
}

impl ActionParams {
    pub fn action(&self) -> ActionName {
        match self {
            ActionParams::CreateJob { .. } => ActionName::CreateJob,
            ActionParams::ViewApplications { .. } => ActionName::ViewApplications,
            ActionParams::Shortlist { .. } => ActionName::Shortlist,
            ActionParams::MakeOffer { .. } => ActionName::MakeOffer,
            ActionParams::CompleteJob { .. } => ActionName::CompleteJob,
            ActionParams::LeaveReview { .. } => ActionName::LeaveReview,
            ActionParams::BrowseJobs { .. } => ActionName::BrowseJobs,
            ActionParams::ApplyToJob { .. } => ActionName::ApplyToJob,
            ActionParams::ViewOffers { .. } => ActionName::ViewOffers,
            ActionParams::AcceptOffer { .. } => ActionName::AcceptOffer,
            ActionParams::RejectOffer { .. } => ActionName::RejectOffer,
            ActionParams::ViewReviews => ActionName::ViewReviews,
        }
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Llm,
    Fallback,
}

/// One chosen action. `params == None` means no concrete target could be
/// resolved; the executor turns that into a recoverable failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: ActionName,
    pub reasoning: String,
    pub params: Option<ActionParams>,
    pub source: DecisionSource,
}

/// Parameters a decision service may attach to its suggestion. Every field is
/// optional; anything missing or invalid is resolved from world state instead.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SuggestedParams {
    pub job_id: Option<String>,
    pub application_id: Option<String>,
    pub offer_id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub budget: Option<f64>,
    pub estimated_cost: Option<f64>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub cover_note: Option<String>,
}

pub fn priority_table(role: Role) -> &'static [ActionName] {
    match role {
        Role::JobPosterIndividual | Role::JobPosterOrganization => POSTER_PRIORITY,
        Role::ServiceProvider => PROVIDER_PRIORITY,
        Role::Admin | Role::Viewer => &[],
    }
}

/// Pick the highest-priority available action that has a concrete target.
///
/// Returns `None` only when `available` is empty. If nothing in the priority
/// table resolves, the first available action is returned with empty params.
pub fn fallback_decision<R: Rng>(
    state: &WorldState,
    actor: &Actor,
    available: &BTreeSet<ActionName>,
    catalog: &[JobTemplate],
    rng: &mut R,
) -> Option<Decision> {
    for action in priority_table(actor.role) {
        if !available.contains(action) {
            continue;
        }
        if let Some(params) = synthesize_params(state, actor, *action, catalog, rng) {
            return Some(Decision {
                action: *action,
                reasoning: format!("highest-priority available action for {}", actor.role),
                params: Some(params),
                source: DecisionSource::Fallback,
            });
        }
    }

    let action = *available.iter().next()?;
    Some(Decision {
        action,
        reasoning: "no prioritized action had a target; taking first available".to_string(),
        params: synthesize_params(state, actor, action, catalog, rng),
        source: DecisionSource::Fallback,
    })
}

/// Resolve concrete parameters for `action` from world state.
///
/// Entity-targeting actions pick the first matching candidate; `None` means
/// no candidate exists right now.
pub fn synthesize_params<R: Rng>(
    state: &WorldState,
    actor: &Actor,
    action: ActionName,
    catalog: &[JobTemplate],
    rng: &mut R,
) -> Option<ActionParams> {
    match action {
        ActionName::CreateJob => {
            let template = catalog.choose(rng)?;
            let mut budget = if template.budget_min < template.budget_max {
                rng.gen_range(template.budget_min..=template.budget_max)
            } else {
                template.budget_min
            };
            if actor.role == Role::JobPosterOrganization {
                budget *= ORGANIZATION_BUDGET_FACTOR;
            }
            Some(ActionParams::CreateJob {
                title: template.title.clone(),
                category: template.category.clone(),
                budget: round_cents(budget),
                description: format!("{} ({})", template.title, template.category),
            })
        }
        ActionName::ViewApplications => {
            let application = state
                .applications_received(&actor.id)
                .find(|application| application.status == ApplicationStatus::UnderReview)?;
            Some(ActionParams::ViewApplications {
                job_id: application.job_id.clone(),
            })
        }
        ActionName::Shortlist => {
            let application = state.applications_received(&actor.id).find(|application| {
                application.status == ApplicationStatus::Viewed
                    && job_is_open(state, &application.job_id)
            })?;
            Some(ActionParams::Shortlist {
                application_id: application.id.clone(),
            })
        }
        ActionName::MakeOffer => {
            let application = state
                .applications_received(&actor.id)
                .find(|application| offerable(state, &application.id))?;
            Some(ActionParams::MakeOffer {
                job_id: application.job_id.clone(),
                application_id: application.id.clone(),
                provider_id: application.applicant_id.clone(),
                budget: round_cents(application.estimated_cost),
            })
        }
        ActionName::CompleteJob => {
            let offer = state
                .offers_made_by(&actor.id, OfferStatus::Accepted)
                .next()?;
            Some(ActionParams::CompleteJob {
                offer_id: offer.id.clone(),
            })
        }
        ActionName::LeaveReview => {
            let offer = state.reviewable_offers(&actor.id).next()?;
            let feedback = REVIEW_FEEDBACK
                .choose(rng)
                .copied()
                .unwrap_or("Good work.")
                .to_string();
            Some(ActionParams::LeaveReview {
                offer_id: offer.id.clone(),
                rating: rng.gen_range(4..=5),
                feedback,
            })
        }
        ActionName::BrowseJobs => Some(ActionParams::BrowseJobs { category: None }),
        ActionName::ApplyToJob => {
            let job = first_open_job_for(state, actor)?;
            let (low, high) = bid_range(state, &job.poster_id);
            let estimated_cost = round_cents(job.budget * rng.gen_range(low..=high));
            Some(ActionParams::ApplyToJob {
                job_id: job.id.clone(),
                estimated_cost,
                cover_note: format!("Available to start on '{}' this week.", job.title),
            })
        }
        ActionName::ViewOffers => Some(ActionParams::ViewOffers { status: None }),
        ActionName::AcceptOffer => {
            let offer = state
                .offers_addressed_to(&actor.id, OfferStatus::Pending)
                .next()?;
            Some(ActionParams::AcceptOffer {
                offer_id: offer.id.clone(),
            })
        }
        ActionName::RejectOffer => {
            let offer = state
                .offers_addressed_to(&actor.id, OfferStatus::Pending)
                .next()?;
            Some(ActionParams::RejectOffer {
                offer_id: offer.id.clone(),
            })
        }
        ActionName::ViewReviews => Some(ActionParams::ViewReviews),
    }
}

/// Validate parameters suggested by the decision service against world state.
///
/// Returns `None` if any required reference is missing or does not point at a
/// legal target for this actor; the caller then synthesizes instead.
pub fn params_from_suggestion(
    state: &WorldState,
    actor: &Actor,
    action: ActionName,
    suggested: &SuggestedParams,
) -> Option<ActionParams> {
    match action {
        ActionName::CreateJob => {
            let title = non_empty(suggested.title.as_deref())?;
            let category = non_empty(suggested.category.as_deref())?;
            let budget = suggested.budget.filter(|budget| *budget > 0.0)?;
            Some(ActionParams::CreateJob {
                title: title.to_string(),
                category: category.to_string(),
                budget: round_cents(budget),
                description: format!("{title} ({category})"),
            })
        }
        ActionName::ViewApplications => {
            let job = state.job(suggested.job_id.as_deref()?)?;
            (job.poster_id == actor.id).then(|| ActionParams::ViewApplications {
                job_id: job.id.clone(),
            })
        }
        ActionName::Shortlist => {
            let application = state.application(suggested.application_id.as_deref()?)?;
            let owned = state
                .job(&application.job_id)
                .is_some_and(|job| job.poster_id == actor.id);
            (owned && shortlistable(state, &application.id)).then(|| ActionParams::Shortlist {
                application_id: application.id.clone(),
            })
        }
        ActionName::MakeOffer => {
            let application = state.application(suggested.application_id.as_deref()?)?;
            let owned = state
                .job(&application.job_id)
                .is_some_and(|job| job.poster_id == actor.id);
            if !owned || !offerable(state, &application.id) {
                return None;
            }
            let budget = suggested
                .budget
                .filter(|budget| *budget > 0.0)
                .unwrap_or(application.estimated_cost);
            Some(ActionParams::MakeOffer {
                job_id: application.job_id.clone(),
                application_id: application.id.clone(),
                provider_id: application.applicant_id.clone(),
                budget: round_cents(budget),
            })
        }
        ActionName::CompleteJob => {
            let offer = state.offer(suggested.offer_id.as_deref()?)?;
            (offer.poster_id == actor.id && offer.status == OfferStatus::Accepted).then(|| {
                ActionParams::CompleteJob {
                    offer_id: offer.id.clone(),
                }
            })
        }
        ActionName::LeaveReview => {
            let offer_id = suggested.offer_id.as_deref()?;
            let offer = state.reviewable_offers(&actor.id).find(|o| o.id == offer_id)?;
            let rating = suggested.rating.filter(|rating| (1..=5).contains(rating))?;
            let feedback = non_empty(suggested.feedback.as_deref())?;
            Some(ActionParams::LeaveReview {
                offer_id: offer.id.clone(),
                rating,
                feedback: feedback.to_string(),
            })
        }
        ActionName::BrowseJobs => Some(ActionParams::BrowseJobs {
            category: non_empty(suggested.category.as_deref()).map(str::to_string),
        }),
        ActionName::ApplyToJob => {
            let job = state.job(suggested.job_id.as_deref()?)?;
            let legal = job.status == JobStatus::Open
                && job.poster_id != actor.id
                && !state.has_applied(&actor.id, &job.id);
            let estimated_cost = suggested.estimated_cost.filter(|cost| *cost > 0.0)?;
            legal.then(|| ActionParams::ApplyToJob {
                job_id: job.id.clone(),
                estimated_cost: round_cents(estimated_cost),
                cover_note: suggested
                    .cover_note
                    .clone()
                    .unwrap_or_else(|| format!("Interested in '{}'.", job.title)),
            })
        }
        ActionName::ViewOffers => Some(ActionParams::ViewOffers { status: None }),
        ActionName::AcceptOffer | ActionName::RejectOffer => {
            let offer = state.offer(suggested.offer_id.as_deref()?)?;
            if offer.provider_id != actor.id || offer.status != OfferStatus::Pending {
                return None;
            }
            let offer_id = offer.id.clone();
            Some(if action == ActionName::AcceptOffer {
                ActionParams::AcceptOffer { offer_id }
            } else {
                ActionParams::RejectOffer { offer_id }
            })
        }
        ActionName::ViewReviews => Some(ActionParams::ViewReviews),
    }
}

/// Bid multiplier range, by the flavor of the poster that owns the job.
fn bid_range(state: &WorldState, poster_id: &str) -> (f64, f64) {
    match state.actor(poster_id).map(|actor| actor.role) {
        Some(Role::JobPosterIndividual) => (0.85, 1.05),
        Some(Role::JobPosterOrganization) => (0.95, 1.20),
        _ => (0.85, 1.20),
    }
}

/// Viewed or shortlisted, on an OPEN job with no live offer, never offered before.
fn offerable(state: &WorldState, application_id: &str) -> bool {
    let Some(application) = state.application(application_id) else {
        return false;
    };
    matches!(
        application.status,
        ApplicationStatus::Viewed | ApplicationStatus::Shortlisted
    ) && job_is_open(state, &application.job_id)
        && !state.job_has_live_offer(&application.job_id)
        && !state.application_has_offer(&application.id)
}

/// Still in review (`UR` or `VW`) on a job that is open.
fn shortlistable(state: &WorldState, application_id: &str) -> bool {
    state.application(application_id).is_some_and(|application| {
        matches!(application.status, ApplicationStatus::UnderReview | ApplicationStatus::Viewed)
            && job_is_open(state, &application.job_id)
    })
}

fn job_is_open(state: &WorldState, job_id: &str) -> bool {
    state
        .job(job_id)
        .is_some_and(|job| job.status == JobStatus::Open)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
