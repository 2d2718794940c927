//! Availability resolution: which actions an actor may take right now.
//!
//! Derived entirely from `WorldState`; no side effects.

use std::collections::BTreeSet;

use crate::core::types::{ActionName, JobStatus, OfferStatus, Role};
use crate::core::world::{Actor, Job, WorldState};

/// A provider stops applying once they hold this many applications.
pub const APPLICATION_SPAM_CAP: usize = 5;

/// Actions legal for `actor` given `state`, in `ActionName` order.
pub fn available_actions(state: &WorldState, actor: &Actor) -> BTreeSet<ActionName> {
    match actor.role {
        Role::JobPosterIndividual | Role::JobPosterOrganization => poster_actions(state, actor),
        Role::ServiceProvider => provider_actions(state, actor),
        Role::Admin | Role::Viewer => BTreeSet::new(),
    }
}

fn poster_actions(state: &WorldState, actor: &Actor) -> BTreeSet<ActionName> {
    let mut actions = BTreeSet::from([ActionName::CreateJob]);

    if state.jobs_posted_by(&actor.id).next().is_some() {
        actions.insert(ActionName::ViewApplications);
    }
    if state.applications_received(&actor.id).next().is_some() {
        actions.insert(ActionName::Shortlist);
        actions.insert(ActionName::MakeOffer);
    }
    if state
        .offers_made_by(&actor.id, OfferStatus::Accepted)
        .next()
        .is_some()
    {
        actions.insert(ActionName::CompleteJob);
    }
    if state.reviewable_offers(&actor.id).next().is_some() {
        actions.insert(ActionName::LeaveReview);
    }
    actions
}

fn provider_actions(state: &WorldState, actor: &Actor) -> BTreeSet<ActionName> {
    let mut actions = BTreeSet::from([
        ActionName::BrowseJobs,
        ActionName::ViewOffers,
        ActionName::ViewReviews,
    ]);

    if state.applications_by(&actor.id).count() < APPLICATION_SPAM_CAP
        && first_open_job_for(state, actor).is_some()
    {
        actions.insert(ActionName::ApplyToJob);
    }
    if state
        .offers_addressed_to(&actor.id, OfferStatus::Pending)
        .next()
        .is_some()
    {
        actions.insert(ActionName::AcceptOffer);
        actions.insert(ActionName::RejectOffer);
    }
    actions
}

/// First OPEN job the provider neither posted nor applied to.
pub fn first_open_job_for<'a>(state: &'a WorldState, actor: &Actor) -> Option<&'a Job> {
    state.jobs.iter().find(|job| {
        job.status == JobStatus::Open
            && job.poster_id != actor.id
            && !state.has_applied(&actor.id, &job.id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ApplicationStatus;
    use crate::test_support::{actor, application, job, offer, poster, provider, review};

    #[test]
    fn fresh_poster_can_only_create_jobs() {
        let state = WorldState::default();
        let poster = poster("poster-1");
        assert_eq!(
            available_actions(&state, &poster),
            BTreeSet::from([ActionName::CreateJob])
        );
    }

    #[test]
    fn poster_actions_follow_their_jobs_and_offers() {
        let mut state = WorldState::default();
        let poster = poster("poster-1");
        state.upsert_job(job("job-1", "poster-1", 300.0));
        assert!(available_actions(&state, &poster).contains(&ActionName::ViewApplications));
        assert!(!available_actions(&state, &poster).contains(&ActionName::MakeOffer));

        state.upsert_application(application("app-1", "job-1", "provider-1", 300.0));
        let actions = available_actions(&state, &poster);
        assert!(actions.contains(&ActionName::MakeOffer));
        assert!(actions.contains(&ActionName::Shortlist));
        assert!(!actions.contains(&ActionName::CompleteJob));

        state.upsert_offer(offer(
            "offer-1",
            "job-1",
            "poster-1",
            "provider-1",
            OfferStatus::Accepted,
        ));
        assert!(available_actions(&state, &poster).contains(&ActionName::CompleteJob));
    }

    #[test]
    fn leave_review_disappears_once_reviewed() {
        let mut state = WorldState::default();
        let poster = poster("poster-1");
        state.upsert_job(job("job-1", "poster-1", 300.0));
        state.upsert_offer(offer(
            "offer-1",
            "job-1",
            "poster-1",
            "provider-1",
            OfferStatus::Completed,
        ));
        assert!(available_actions(&state, &poster).contains(&ActionName::LeaveReview));

        state.upsert_review(review("review-1", "offer-1", "poster-1", 4));
        assert!(!available_actions(&state, &poster).contains(&ActionName::LeaveReview));
    }

    #[test]
    fn provider_cannot_apply_to_own_applied_or_closed_jobs() {
        let mut state = WorldState::default();
        let provider = provider("provider-1");
        let mut closed = job("job-closed", "poster-1", 100.0);
        closed.status = JobStatus::Closed;
        state.upsert_job(closed);
        state.upsert_job(job("job-own", "provider-1", 100.0));
        state.upsert_job(job("job-applied", "poster-1", 100.0));
        state.upsert_application(application("app-1", "job-applied", "provider-1", 90.0));

        assert!(!available_actions(&state, &provider).contains(&ActionName::ApplyToJob));

        state.upsert_job(job("job-fresh", "poster-1", 100.0));
        assert!(available_actions(&state, &provider).contains(&ActionName::ApplyToJob));
    }

    #[test]
    fn provider_stops_applying_at_spam_cap() {
        let mut state = WorldState::default();
        let provider = provider("provider-1");
        for index in 0..APPLICATION_SPAM_CAP {
            let job_id = format!("job-{index}");
            state.upsert_job(job(&job_id, "poster-1", 100.0));
            state.upsert_application(application(
                &format!("app-{index}"),
                &job_id,
                "provider-1",
                100.0,
            ));
        }
        state.upsert_job(job("job-extra", "poster-1", 100.0));

        assert!(!available_actions(&state, &provider).contains(&ActionName::ApplyToJob));
    }

    #[test]
    fn pending_offers_enable_accept_and_reject_only_while_pending() {
        let mut state = WorldState::default();
        let provider = provider("provider-1");
        state.upsert_job(job("job-1", "poster-1", 300.0));
        state.upsert_offer(offer(
            "offer-1",
            "job-1",
            "poster-1",
            "provider-1",
            OfferStatus::Pending,
        ));
        let actions = available_actions(&state, &provider);
        assert!(actions.contains(&ActionName::AcceptOffer));
        assert!(actions.contains(&ActionName::RejectOffer));

        state.offers[0].status = OfferStatus::Accepted;
        let actions = available_actions(&state, &provider);
        assert!(!actions.contains(&ActionName::AcceptOffer));
        assert!(!actions.contains(&ActionName::RejectOffer));
    }

    #[test]
    fn passive_roles_have_no_actions() {
        let state = WorldState::default();
        assert!(available_actions(&state, &actor("admin-1", Role::Admin)).is_empty());
        assert!(available_actions(&state, &actor("viewer-1", Role::Viewer)).is_empty());
    }

    #[test]
    fn resolution_is_pure() {
        let mut state = WorldState::default();
        let poster = poster("poster-1");
        state.upsert_job(job("job-1", "poster-1", 300.0));
        let mut app = application("app-1", "job-1", "provider-1", 300.0);
        app.status = ApplicationStatus::Viewed;
        state.upsert_application(app);
        let snapshot = state.clone();

        let first = available_actions(&state, &poster);
        let second = available_actions(&state, &poster);
        assert_eq!(first, second);
        assert_eq!(state, snapshot);
    }
}
