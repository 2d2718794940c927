//! Action executor: one tool call per decision, folded back into world state.
//!
//! Tool failures stop here. They become a failed [`ActionRecord`] plus an
//! entry in the error list, and the simulation carries on.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::core::policy::{ActionParams, Decision};
use crate::core::types::{ApplicationStatus, JobStatus, OfferStatus};
use crate::core::world::{ActionRecord, Actor, Application, Job, Offer, Review, WorldState};
use crate::io::backend::{
    IdentityProvisioner, NewApplication, NewJob, NewOffer, NewReview, SessionExpiredError,
    ToolSurface,
};

/// The two backend seams a turn needs.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub tools: &'a dyn ToolSurface,
    pub identities: &'a dyn IdentityProvisioner,
}

/// What a successful tool call returned.
#[derive(Debug, Clone, PartialEq)]
enum ToolEffect {
    JobCreated(Job),
    ApplicationsFetched { job_id: String, applications: Vec<Application> },
    Shortlisted(Application),
    OfferMade(Offer),
    OfferCompleted(Offer),
    Reviewed(Review),
    JobsFetched(Vec<Job>),
    Applied(Application),
    OffersFetched(Vec<Offer>),
    OfferAccepted(Offer),
    OfferRejected(Offer),
    ReviewsFetched(Vec<Review>),
}

/// Run `decision` for `actor` and append exactly one record to the history.
#[instrument(skip_all, fields(actor_id = %actor.id, action = %decision.action))]
pub fn execute(
    state: &mut WorldState,
    actor: &Actor,
    decision: &Decision,
    backends: Backends<'_>,
) -> ActionRecord {
    let outcome = match &decision.params {
        Some(params) => call_with_session_retry(state, actor, params, backends),
        None => Err(anyhow!("no valid target for {}", decision.action)),
    };

    let record = match outcome {
        Ok(effect) => {
            let result = apply_effect(state, actor, effect);
            ActionRecord {
                role: actor.role,
                action: decision.action,
                actor_id: actor.id.clone(),
                success: true,
                error: None,
                result: Some(result),
                at: Utc::now(),
            }
        }
        Err(err) => {
            let error = format!("{err:#}");
            warn!(%error, "action failed");
            state.log_error(format!("{} {} failed: {error}", actor.id, decision.action));
            ActionRecord {
                role: actor.role,
                action: decision.action,
                actor_id: actor.id.clone(),
                success: false,
                error: Some(error),
                result: None,
                at: Utc::now(),
            }
        }
    };
    state.record(record.clone());
    record
}

/// Call the tool once; on an expired session refresh it and retry once.
fn call_with_session_retry(
    state: &mut WorldState,
    actor: &Actor,
    params: &ActionParams,
    backends: Backends<'_>,
) -> Result<ToolEffect> {
    match call_tool(backends.tools, actor, params) {
        Err(err) if err.downcast_ref::<SessionExpiredError>().is_some() => {
            info!("session expired, refreshing");
            let session = backends
                .identities
                .refresh_session(actor)
                .with_context(|| format!("refresh session for {}", actor.id))?;
            if let Some(stored) = state.actor_mut(&actor.id) {
                stored.session = session.clone();
            }
            let refreshed = Actor {
                session,
                ..actor.clone()
            };
            call_tool(backends.tools, &refreshed, params)
        }
        other => other,
    }
}

fn call_tool(tools: &dyn ToolSurface, actor: &Actor, params: &ActionParams) -> Result<ToolEffect> {
    let effect = match params {
        ActionParams::CreateJob {
            title,
            category,
            budget,
            description,
        } => ToolEffect::JobCreated(tools.create_job(
            actor,
            &NewJob {
                title: title.clone(),
                category: category.clone(),
                budget: *budget,
                description: description.clone(),
            },
        )?),
        ActionParams::ViewApplications { job_id } => ToolEffect::ApplicationsFetched {
            job_id: job_id.clone(),
            applications: tools.fetch_applications(actor, job_id)?,
        },
        ActionParams::Shortlist { application_id } => ToolEffect::Shortlisted(
            tools.update_application_status(actor, application_id, ApplicationStatus::Shortlisted)?,
        ),
        ActionParams::MakeOffer {
            job_id,
            application_id,
            provider_id,
            budget,
        } => ToolEffect::OfferMade(tools.create_offer(
            actor,
            &NewOffer {
                job_id: job_id.clone(),
                application_id: Some(application_id.clone()),
                provider_id: provider_id.clone(),
                budget: *budget,
            },
        )?),
        ActionParams::CompleteJob { offer_id } => {
            ToolEffect::OfferCompleted(tools.complete_offer(actor, offer_id)?)
        }
        ActionParams::LeaveReview {
            offer_id,
            rating,
            feedback,
        } => ToolEffect::Reviewed(tools.create_review(
            actor,
            &NewReview {
                offer_id: offer_id.clone(),
                rating: *rating,
                feedback: feedback.clone(),
            },
        )?),
        ActionParams::BrowseJobs { category } => {
            ToolEffect::JobsFetched(tools.fetch_matching_jobs(actor, category.as_deref())?)
        }
        ActionParams::ApplyToJob {
            job_id,
            estimated_cost,
            cover_note,
        } => ToolEffect::Applied(tools.submit_application(
            actor,
            &NewApplication {
                job_id: job_id.clone(),
                estimated_cost: *estimated_cost,
                cover_note: cover_note.clone(),
            },
        )?),
        ActionParams::ViewOffers { status } => {
            ToolEffect::OffersFetched(tools.fetch_offers(actor, *status)?)
        }
        ActionParams::AcceptOffer { offer_id } => {
            ToolEffect::OfferAccepted(tools.respond_to_offer(actor, offer_id, true)?)
        }
        ActionParams::RejectOffer { offer_id } => {
            ToolEffect::OfferRejected(tools.respond_to_offer(actor, offer_id, false)?)
        }
        ActionParams::ViewReviews => ToolEffect::ReviewsFetched(tools.fetch_reviews(actor)?),
    };
    Ok(effect)
}

/// Fold a successful effect into state, push a message and build the result payload.
fn apply_effect(state: &mut WorldState, actor: &Actor, effect: ToolEffect) -> Value {
    let who = &actor.display_name;
    match effect {
        ToolEffect::JobCreated(job) => {
            state.log(format!(
                "{who} posted \"{}\" ({}) for ${:.2}",
                job.title, job.category, job.budget
            ));
            let result = json!({ "job_id": job.id });
            state.upsert_job(job);
            result
        }
        ToolEffect::ApplicationsFetched {
            job_id,
            applications,
        } => {
            let total = applications.len();
            let updated = applications
                .into_iter()
                .filter(|application| state.upsert_application(application.clone()))
                .count();
            state.log(format!(
                "{who} reviewed {total} application(s) for job {job_id}"
            ));
            json!({ "job_id": job_id, "applications": total, "updated": updated })
        }
        ToolEffect::Shortlisted(application) => {
            state.log(format!(
                "{who} shortlisted application {} for job {}",
                application.id, application.job_id
            ));
            let result = json!({ "application_id": application.id });
            state.upsert_application(application);
            result
        }
        ToolEffect::OfferMade(offer) => {
            state.log(format!(
                "{who} offered job {} to {} for ${:.2}",
                offer.job_id, offer.provider_id, offer.budget
            ));
            let result = json!({ "offer_id": offer.id });
            state.upsert_offer(offer);
            result
        }
        ToolEffect::OfferAccepted(offer) => {
            state.log(format!("{who} accepted offer {}", offer.id));
            state.transition_job(&offer.job_id, JobStatus::InProgress);
            if let Some(application_id) = &offer.application_id {
                state.set_application_status(application_id, ApplicationStatus::Accepted);
            }
            let result = json!({ "offer_id": offer.id, "status": OfferStatus::Accepted.as_str() });
            state.upsert_offer(offer);
            result
        }
        ToolEffect::OfferRejected(offer) => {
            state.log(format!("{who} declined offer {}", offer.id));
            let result = json!({ "offer_id": offer.id, "status": OfferStatus::Rejected.as_str() });
            state.upsert_offer(offer);
            result
        }
        ToolEffect::OfferCompleted(offer) => {
            state.log(format!("{who} marked job {} complete", offer.job_id));
            state.transition_job(&offer.job_id, JobStatus::Completed);
            close_other_applications(state, &offer);
            let result = json!({ "offer_id": offer.id, "job_id": offer.job_id });
            state.upsert_offer(offer);
            result
        }
        ToolEffect::Reviewed(review) => {
            state.log(format!(
                "{who} left a {}-star review on offer {}",
                review.rating, review.offer_id
            ));
            let result = json!({ "review_id": review.id, "rating": review.rating });
            state.upsert_review(review);
            result
        }
        ToolEffect::JobsFetched(jobs) => {
            let total = jobs.len();
            let updated = jobs.into_iter().filter(|job| state.upsert_job(job.clone())).count();
            state.log(format!("{who} browsed {total} open job(s)"));
            json!({ "jobs": total, "updated": updated })
        }
        ToolEffect::Applied(application) => {
            state.log(format!(
                "{who} applied to job {} quoting ${:.2}",
                application.job_id, application.estimated_cost
            ));
            let result = json!({ "application_id": application.id });
            state.upsert_application(application);
            result
        }
        ToolEffect::OffersFetched(offers) => {
            let total = offers.len();
            let updated = offers
                .into_iter()
                .filter(|offer| state.upsert_offer(offer.clone()))
                .count();
            state.log(format!("{who} checked {total} offer(s)"));
            json!({ "offers": total, "updated": updated })
        }
        ToolEffect::ReviewsFetched(reviews) => {
            let total = reviews.len();
            let updated = reviews
                .into_iter()
                .filter(|review| state.upsert_review(review.clone()))
                .count();
            state.log(format!("{who} read {total} review(s)"));
            json!({ "reviews": total, "updated": updated })
        }
    }
}

/// Applications on a completed job that were not hired are closed.
fn close_other_applications(state: &mut WorldState, offer: &Offer) {
    let losers: Vec<String> = state
        .applications
        .iter()
        .filter(|application| {
            application.job_id == offer.job_id && application.status != ApplicationStatus::Accepted
        })
        .map(|application| application.id.clone())
        .collect();
    for application_id in losers {
        state.set_application_status(&application_id, ApplicationStatus::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{DecisionSource, synthesize_params};
    use crate::core::types::{ActionName, Role};
    use crate::io::memory_backend::InMemoryBackend;
    use crate::test_support::seeded_rng;

    fn decision(params: Option<ActionParams>, action: ActionName) -> Decision {
        Decision {
            action,
            reasoning: "test".to_string(),
            params,
            source: DecisionSource::Fallback,
        }
    }

    fn provisioned(backend: &InMemoryBackend, state: &mut WorldState, role: Role) -> Actor {
        let actor = backend
            .create_identity(role, state.actors.len())
            .expect("identity");
        state.add_actor(actor.clone());
        actor
    }

    fn backends(backend: &InMemoryBackend) -> Backends<'_> {
        Backends {
            tools: backend,
            identities: backend,
        }
    }

    fn create_job(title: &str, budget: f64) -> Decision {
        decision(
            Some(ActionParams::CreateJob {
                title: title.to_string(),
                category: "Plumbing".to_string(),
                budget,
                description: format!("{title} (Plumbing)"),
            }),
            ActionName::CreateJob,
        )
    }

    #[test]
    fn successful_action_upserts_and_records_once() {
        let backend = InMemoryBackend::new();
        let mut state = WorldState::default();
        let poster = provisioned(&backend, &mut state, Role::JobPosterIndividual);

        let record = execute(
            &mut state,
            &poster,
            &create_job("Fix sink", 300.0),
            backends(&backend),
        );

        assert!(record.success);
        assert_eq!(state.jobs.len(), 1);
        assert_eq!(state.jobs[0].status, JobStatus::Open);
        assert_eq!(state.history.len(), 1);
        assert!(state.messages[0].contains("Fix sink"));
        assert!(state.errors.is_empty());
    }

    #[test]
    fn missing_params_become_a_recorded_failure() {
        let backend = InMemoryBackend::new();
        let mut state = WorldState::default();
        let poster = provisioned(&backend, &mut state, Role::JobPosterIndividual);

        let record = execute(
            &mut state,
            &poster,
            &decision(None, ActionName::MakeOffer),
            backends(&backend),
        );

        assert!(!record.success);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].contains("no valid target for make_offer"));
    }

    #[test]
    fn tool_failure_is_contained() {
        let backend = InMemoryBackend::new();
        let mut state = WorldState::default();
        let poster = provisioned(&backend, &mut state, Role::JobPosterIndividual);
        backend.fail_operation("create_job");

        let record = execute(
            &mut state,
            &poster,
            &create_job("Fix sink", 300.0),
            backends(&backend),
        );

        assert!(!record.success);
        assert!(state.jobs.is_empty());
        assert_eq!(state.errors.len(), 1);
        assert!(state.messages[0].starts_with("error: "));
    }

    #[test]
    fn expired_session_is_refreshed_and_retried() {
        let backend = InMemoryBackend::new().with_session_ttl(1);
        let mut state = WorldState::default();
        let poster = provisioned(&backend, &mut state, Role::JobPosterIndividual);

        let first = execute(
            &mut state,
            &poster,
            &create_job("Fix sink", 300.0),
            backends(&backend),
        );
        assert!(first.success);
        let second = execute(
            &mut state,
            &poster,
            &create_job("Paint fence", 200.0),
            backends(&backend),
        );

        assert!(second.success);
        assert_eq!(state.jobs.len(), 2);
        assert_ne!(state.actors[0].session, poster.session);
        assert!(state.errors.is_empty());
    }

    #[test]
    fn accept_then_complete_moves_job_through_lifecycle() {
        let backend = InMemoryBackend::new();
        let mut state = WorldState::default();
        let poster = provisioned(&backend, &mut state, Role::JobPosterIndividual);
        let winner = provisioned(&backend, &mut state, Role::ServiceProvider);
        let other = provisioned(&backend, &mut state, Role::ServiceProvider);

        execute(&mut state, &poster, &create_job("Fix sink", 300.0), backends(&backend));
        let job_id = state.jobs[0].id.clone();
        for (provider, cost) in [(&winner, 280.0), (&other, 310.0)] {
            let apply = decision(
                Some(ActionParams::ApplyToJob {
                    job_id: job_id.clone(),
                    estimated_cost: cost,
                    cover_note: "ready".to_string(),
                }),
                ActionName::ApplyToJob,
            );
            assert!(execute(&mut state, provider, &apply, backends(&backend)).success);
        }
        let view = decision(
            Some(ActionParams::ViewApplications {
                job_id: job_id.clone(),
            }),
            ActionName::ViewApplications,
        );
        assert!(execute(&mut state, &poster, &view, backends(&backend)).success);
        assert!(
            state
                .applications
                .iter()
                .all(|application| application.status == ApplicationStatus::Viewed)
        );

        let application_id = state
            .applications_by(&winner.id)
            .next()
            .map(|application| application.id.clone())
            .expect("winner application");
        let offer = decision(
            Some(ActionParams::MakeOffer {
                job_id: job_id.clone(),
                application_id: application_id.clone(),
                provider_id: winner.id.clone(),
                budget: 280.0,
            }),
            ActionName::MakeOffer,
        );
        assert!(execute(&mut state, &poster, &offer, backends(&backend)).success);
        let offer_id = state.offers[0].id.clone();

        let accept = decision(
            Some(ActionParams::AcceptOffer {
                offer_id: offer_id.clone(),
            }),
            ActionName::AcceptOffer,
        );
        assert!(execute(&mut state, &winner, &accept, backends(&backend)).success);
        assert_eq!(state.jobs[0].status, JobStatus::InProgress);
        assert_eq!(
            state.application(&application_id).map(|a| a.status),
            Some(ApplicationStatus::Accepted)
        );

        let complete = decision(
            Some(ActionParams::CompleteJob {
                offer_id: offer_id.clone(),
            }),
            ActionName::CompleteJob,
        );
        assert!(execute(&mut state, &poster, &complete, backends(&backend)).success);
        assert_eq!(state.jobs[0].status, JobStatus::Completed);
        assert_eq!(state.offers[0].status, OfferStatus::Completed);
        let loser = state.applications_by(&other.id).next().expect("other application");
        assert_eq!(loser.status, ApplicationStatus::Closed);
        assert_eq!(state.history.len(), 7);
    }

    #[test]
    fn rejected_offer_leaves_job_open_for_other_applicants() {
        let backend = InMemoryBackend::new();
        let mut state = WorldState::default();
        let poster = provisioned(&backend, &mut state, Role::JobPosterIndividual);
        let first = provisioned(&backend, &mut state, Role::ServiceProvider);
        let second = provisioned(&backend, &mut state, Role::ServiceProvider);

        execute(&mut state, &poster, &create_job("Fix sink", 300.0), backends(&backend));
        let job_id = state.jobs[0].id.clone();
        for provider in [&first, &second] {
            let apply = decision(
                Some(ActionParams::ApplyToJob {
                    job_id: job_id.clone(),
                    estimated_cost: 290.0,
                    cover_note: "ready".to_string(),
                }),
                ActionName::ApplyToJob,
            );
            assert!(execute(&mut state, provider, &apply, backends(&backend)).success);
        }
        let view = decision(
            Some(ActionParams::ViewApplications {
                job_id: job_id.clone(),
            }),
            ActionName::ViewApplications,
        );
        assert!(execute(&mut state, &poster, &view, backends(&backend)).success);

        let Some(params) = synthesize_params(
            &state,
            &poster,
            ActionName::MakeOffer,
            &[],
            &mut seeded_rng(1),
        ) else {
            panic!("first applicant should be offerable");
        };
        let offer = decision(Some(params), ActionName::MakeOffer);
        assert!(execute(&mut state, &poster, &offer, backends(&backend)).success);
        let offer_id = state.offers[0].id.clone();
        assert_eq!(state.offers[0].provider_id, first.id);

        let reject = decision(
            Some(ActionParams::RejectOffer {
                offer_id: offer_id.clone(),
            }),
            ActionName::RejectOffer,
        );
        let record = execute(&mut state, &first, &reject, backends(&backend));
        assert!(record.success);
        let status = record.result.as_ref().map(|result| result["status"].clone());
        assert_eq!(status, Some(json!("REJECTED")));
        assert_eq!(state.offers[0].status, OfferStatus::Rejected);
        assert_eq!(state.jobs[0].status, JobStatus::Open);
        assert!(state.messages.iter().any(|message| message.contains("declined offer")));

        let Some(params) = synthesize_params(
            &state,
            &poster,
            ActionName::MakeOffer,
            &[],
            &mut seeded_rng(1),
        ) else {
            panic!("second applicant should be offerable");
        };
        let ActionParams::MakeOffer { provider_id, .. } = &params else {
            panic!("expected make_offer params, got {params:?}");
        };
        assert_eq!(provider_id, &second.id);
        let offer = decision(Some(params), ActionName::MakeOffer);
        assert!(execute(&mut state, &poster, &offer, backends(&backend)).success);
        assert_eq!(state.offers.len(), 2);
        assert_eq!(state.offers[1].status, OfferStatus::Pending);
        assert_eq!(state.offers[1].provider_id, second.id);
    }
}
