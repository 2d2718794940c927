//! In-memory world model shared by every actor of a run.
//!
//! `WorldState` is a plain aggregate: the simulation loop owns it and threads
//! `&mut WorldState` through one actor turn at a time. Query helpers here are
//! pure and are what the availability resolver and the policy read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{ActionName, ApplicationStatus, JobStatus, OfferStatus, Role, RunStatus};

/// A provisioned participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub display_name: String,
    /// Durable identity reference issued by the identity provider.
    pub identity_ref: String,
    /// Provider profile reference, used when offers are addressed to this actor.
    pub profile_ref: Option<String>,
    /// Backend session credential. The only field refreshed after creation.
    pub session: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub category: String,
    pub status: JobStatus,
    pub poster_id: String,
    pub budget: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub job_id: String,
    pub applicant_id: String,
    pub profile_ref: Option<String>,
    pub status: ApplicationStatus,
    pub estimated_cost: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub job_id: String,
    pub application_id: Option<String>,
    pub poster_id: String,
    pub provider_id: String,
    pub status: OfferStatus,
    pub budget: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub offer_id: String,
    pub reviewer_id: String,
    pub rating: u8,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only log entry for one attempted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub role: Role,
    pub action: ActionName,
    pub actor_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub actors: Vec<Actor>,
    pub jobs: Vec<Job>,
    pub applications: Vec<Application>,
    pub offers: Vec<Offer>,
    pub reviews: Vec<Review>,
    pub history: Vec<ActionRecord>,
    pub errors: Vec<String>,
    pub messages: Vec<String>,
    pub status: RunStatus,
    /// Bumped on every entity mutation; lets the loop tell whether anything
    /// changed since an actor was last evaluated.
    #[serde(skip)]
    revision: u64,
}

impl WorldState {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn actor(&self, actor_id: &str) -> Option<&Actor> {
        self.actors.iter().find(|actor| actor.id == actor_id)
    }

    pub fn actor_mut(&mut self, actor_id: &str) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|actor| actor.id == actor_id)
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == job_id)
    }

    pub fn application(&self, application_id: &str) -> Option<&Application> {
        self.applications
            .iter()
            .find(|application| application.id == application_id)
    }

    pub fn offer(&self, offer_id: &str) -> Option<&Offer> {
        self.offers.iter().find(|offer| offer.id == offer_id)
    }

    pub fn jobs_posted_by<'a>(&'a self, actor_id: &'a str) -> impl Iterator<Item = &'a Job> + 'a {
        self.jobs.iter().filter(move |job| job.poster_id == actor_id)
    }

    /// Applications placed against any job owned by `poster_id`.
    pub fn applications_received<'a>(
        &'a self,
        poster_id: &'a str,
    ) -> impl Iterator<Item = &'a Application> + 'a {
        self.applications.iter().filter(move |application| {
            self.job(&application.job_id)
                .is_some_and(|job| job.poster_id == poster_id)
        })
    }

    pub fn applications_by<'a>(
        &'a self,
        applicant_id: &'a str,
    ) -> impl Iterator<Item = &'a Application> + 'a {
        self.applications
            .iter()
            .filter(move |application| application.applicant_id == applicant_id)
    }

    pub fn has_applied(&self, applicant_id: &str, job_id: &str) -> bool {
        self.applications_by(applicant_id)
            .any(|application| application.job_id == job_id)
    }

    pub fn offers_made_by<'a>(
        &'a self,
        poster_id: &'a str,
        status: OfferStatus,
    ) -> impl Iterator<Item = &'a Offer> + 'a {
        self.offers
            .iter()
            .filter(move |offer| offer.poster_id == poster_id && offer.status == status)
    }

    pub fn offers_addressed_to<'a>(
        &'a self,
        provider_id: &'a str,
        status: OfferStatus,
    ) -> impl Iterator<Item = &'a Offer> + 'a {
        self.offers
            .iter()
            .filter(move |offer| offer.provider_id == provider_id && offer.status == status)
    }

    pub fn has_review(&self, offer_id: &str) -> bool {
        self.reviews.iter().any(|review| review.offer_id == offer_id)
    }

    /// COMPLETED offers owned by `poster_id` that nobody has reviewed yet.
    pub fn reviewable_offers<'a>(
        &'a self,
        poster_id: &'a str,
    ) -> impl Iterator<Item = &'a Offer> + 'a {
        self.offers_made_by(poster_id, OfferStatus::Completed)
            .filter(move |offer| !self.has_review(&offer.id))
    }

    /// True when the job already has an offer that binds it.
    pub fn job_has_live_offer(&self, job_id: &str) -> bool {
        self.offers
            .iter()
            .any(|offer| offer.job_id == job_id && offer.status.is_live())
    }

    pub fn application_has_offer(&self, application_id: &str) -> bool {
        self.offers
            .iter()
            .any(|offer| offer.application_id.as_deref() == Some(application_id))
    }

    /// Offers counted towards the hiring goal.
    pub fn hired_offer_count(&self) -> usize {
        self.offers
            .iter()
            .filter(|offer| matches!(offer.status, OfferStatus::Accepted | OfferStatus::Completed))
            .count()
    }

    pub fn add_actor(&mut self, actor: Actor) {
        self.actors.push(actor);
        self.revision += 1;
    }

    /// Insert or replace by id. Each upsert returns true if anything changed.
    pub fn upsert_job(&mut self, job: Job) -> bool {
        let changed = upsert_by_id(&mut self.jobs, job, |job| job.id.as_str());
        self.bump_if(changed)
    }

    pub fn upsert_application(&mut self, application: Application) -> bool {
        let changed = upsert_by_id(&mut self.applications, application, |application| {
            application.id.as_str()
        });
        self.bump_if(changed)
    }

    pub fn upsert_offer(&mut self, offer: Offer) -> bool {
        let changed = upsert_by_id(&mut self.offers, offer, |offer| offer.id.as_str());
        self.bump_if(changed)
    }

    pub fn upsert_review(&mut self, review: Review) -> bool {
        let changed = upsert_by_id(&mut self.reviews, review, |review| review.id.as_str());
        self.bump_if(changed)
    }

    fn bump_if(&mut self, changed: bool) -> bool {
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Move a job to `status` unless it is already there.
    ///
    /// Returns true if the status changed.
    pub fn transition_job(&mut self, job_id: &str, status: JobStatus) -> bool {
        let Some(job) = self.jobs.iter_mut().find(|job| job.id == job_id) else {
            return false;
        };
        if job.status == status {
            return false;
        }
        job.status = status;
        self.revision += 1;
        true
    }

    pub fn set_application_status(&mut self, application_id: &str, status: ApplicationStatus) {
        if let Some(application) = self
            .applications
            .iter_mut()
            .find(|application| application.id == application_id)
        {
            if application.status != status {
                application.status = status;
                self.revision += 1;
            }
        }
    }

    pub fn record(&mut self, record: ActionRecord) {
        self.history.push(record);
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Record a recoverable error in both the error list and the message log.
    pub fn log_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.messages.push(format!("error: {message}"));
        self.errors.push(message);
    }
}

fn upsert_by_id<T: PartialEq>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &str) -> bool {
    match items.iter().position(|existing| id(existing) == id(&item)) {
        Some(index) if items[index] == item => false,
        Some(index) => {
            items[index] = item;
            true
        }
        None => {
            items.push(item);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{application, job, offer, poster, provider, review};

    #[test]
    fn upsert_replaces_existing_records_by_id() {
        let mut state = WorldState::default();
        state.upsert_job(job("job-1", "poster-1", 300.0));
        let mut updated = job("job-1", "poster-1", 300.0);
        updated.title = "Retitled".to_string();
        state.upsert_job(updated);

        assert_eq!(state.jobs.len(), 1);
        assert_eq!(state.jobs[0].title, "Retitled");
    }

    #[test]
    fn applications_received_only_covers_own_jobs() {
        let mut state = WorldState::default();
        state.add_actor(poster("poster-1"));
        state.add_actor(poster("poster-2"));
        state.add_actor(provider("provider-1"));
        state.upsert_job(job("job-1", "poster-1", 300.0));
        state.upsert_job(job("job-2", "poster-2", 300.0));
        state.upsert_application(application("app-1", "job-1", "provider-1", 280.0));
        state.upsert_application(application("app-2", "job-2", "provider-1", 280.0));

        let ids: Vec<&str> = state
            .applications_received("poster-1")
            .map(|application| application.id.as_str())
            .collect();
        assert_eq!(ids, vec!["app-1"]);
    }

    #[test]
    fn reviewed_offers_are_not_reviewable() {
        let mut state = WorldState::default();
        state.upsert_job(job("job-1", "poster-1", 300.0));
        state.upsert_offer(offer(
            "offer-1",
            "job-1",
            "poster-1",
            "provider-1",
            OfferStatus::Completed,
        ));
        assert_eq!(state.reviewable_offers("poster-1").count(), 1);

        state.upsert_review(review("review-1", "offer-1", "poster-1", 5));
        assert_eq!(state.reviewable_offers("poster-1").count(), 0);
    }

    #[test]
    fn transition_job_reports_only_real_changes() {
        let mut state = WorldState::default();
        state.upsert_job(job("job-1", "poster-1", 300.0));
        let before = state.revision();

        assert!(state.transition_job("job-1", JobStatus::InProgress));
        assert!(!state.transition_job("job-1", JobStatus::InProgress));
        assert!(!state.transition_job("missing", JobStatus::Completed));
        assert_eq!(state.revision(), before + 1);
    }

    #[test]
    fn identical_upserts_leave_revision_alone() {
        let mut state = WorldState::default();
        assert!(state.upsert_job(job("job-1", "poster-1", 300.0)));
        let before = state.revision();

        assert!(!state.upsert_job(job("job-1", "poster-1", 300.0)));
        assert_eq!(state.revision(), before);
        assert!(state.upsert_job(job("job-1", "poster-1", 450.0)));
        assert_eq!(state.revision(), before + 1);
    }

    #[test]
    fn log_error_feeds_errors_and_messages() {
        let mut state = WorldState::default();
        state.log_error("create_job failed: backend down");
        assert_eq!(state.errors, vec!["create_job failed: backend down"]);
        assert_eq!(
            state.messages,
            vec!["error: create_job failed: backend down"]
        );
    }
}
