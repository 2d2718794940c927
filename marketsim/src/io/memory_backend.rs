//! In-process marketplace backend.
//!
//! Implements [`IdentityProvisioner`] and [`ToolSurface`] over an in-memory
//! store so simulations can run without a deployed backend. It enforces the
//! same lifecycle rules a real backend would (ownership, offer and job
//! transitions) and exposes failure-injection hooks for tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use tracing::{debug, trace};

use crate::core::types::{ApplicationStatus, JobStatus, OfferStatus, Role};
use crate::core::world::{Actor, Application, Job, Offer, Review};
use crate::io::backend::{
    IdentityProvisioner, NewApplication, NewJob, NewOffer, NewReview, SessionExpiredError,
    ToolSurface,
};

#[derive(Debug, Clone)]
struct Identity {
    actor: Actor,
    email: String,
    calls_since_refresh: u32,
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    identities: BTreeMap<String, Identity>,
    jobs: Vec<Job>,
    applications: Vec<Application>,
    offers: Vec<Offer>,
    reviews: Vec<Review>,
    failing_operations: BTreeSet<String>,
    rejected_roles: BTreeSet<Role>,
    session_ttl_calls: Option<u32>,
}

impl Store {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn check_injected(&self, operation: &str) -> Result<()> {
        if self.failing_operations.contains(operation) {
            bail!("{operation}: backend unavailable (injected failure)");
        }
        Ok(())
    }

    /// Validate the caller's session, counting the call against its TTL.
    fn authorize(&mut self, actor: &Actor) -> Result<()> {
        let ttl = self.session_ttl_calls;
        let identity = self
            .identities
            .get_mut(&actor.id)
            .ok_or_else(|| anyhow!("unknown actor {}", actor.id))?;
        if identity.actor.session != actor.session {
            return Err(SessionExpiredError {
                actor_id: actor.id.clone(),
            }
            .into());
        }
        if let Some(ttl) = ttl {
            if identity.calls_since_refresh >= ttl {
                return Err(SessionExpiredError {
                    actor_id: actor.id.clone(),
                }
                .into());
            }
        }
        identity.calls_since_refresh += 1;
        Ok(())
    }

    fn job_mut(&mut self, job_id: &str) -> Result<&mut Job> {
        self.jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or_else(|| anyhow!("job {job_id} not found"))
    }

    fn owned_job(&self, actor: &Actor, job_id: &str) -> Result<&Job> {
        let job = self
            .jobs
            .iter()
            .find(|job| job.id == job_id)
            .ok_or_else(|| anyhow!("job {job_id} not found"))?;
        if job.poster_id != actor.id {
            bail!("job {job_id} is not owned by {}", actor.id);
        }
        Ok(job)
    }

    fn offer_index(&self, offer_id: &str) -> Result<usize> {
        self.offers
            .iter()
            .position(|offer| offer.id == offer_id)
            .ok_or_else(|| anyhow!("offer {offer_id} not found"))
    }

    fn set_application_status(&mut self, application_id: &str, status: ApplicationStatus) {
        if let Some(application) = self
            .applications
            .iter_mut()
            .find(|application| application.id == application_id)
        {
            application.status = status;
        }
    }
}

/// Marketplace backend held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    store: RefCell<Store>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `operation` (tool method name) fail.
    pub fn fail_operation(&self, operation: &str) {
        self.store
            .borrow_mut()
            .failing_operations
            .insert(operation.to_string());
    }

    pub fn restore_operation(&self, operation: &str) {
        self.store.borrow_mut().failing_operations.remove(operation);
    }

    /// Refuse to provision identities for `role`.
    pub fn reject_role(&self, role: Role) {
        self.store.borrow_mut().rejected_roles.insert(role);
    }

    /// Expire sessions after `calls` authorized tool calls.
    pub fn with_session_ttl(self, calls: u32) -> Self {
        self.store.borrow_mut().session_ttl_calls = Some(calls);
        self
    }

    pub fn identity_count(&self) -> usize {
        self.store.borrow().identities.len()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.store.borrow().jobs.clone()
    }

    pub fn offers(&self) -> Vec<Offer> {
        self.store.borrow().offers.clone()
    }
}

impl IdentityProvisioner for InMemoryBackend {
    fn create_identity(&self, role: Role, ordinal: usize) -> Result<Actor> {
        let mut store = self.store.borrow_mut();
        store.check_injected("create_identity")?;
        if store.rejected_roles.contains(&role) {
            bail!("identity provider rejected role {role}");
        }
        let email = format!("{role}-{ordinal}@marketsim.test");
        if store.identities.values().any(|identity| identity.email == email) {
            bail!("identity {email} already exists");
        }

        let id = store.next_id("user");
        let profile_ref = role
            .is_service_provider()
            .then(|| format!("profile-{id}"));
        let actor = Actor {
            id: id.clone(),
            role,
            display_name: format!("{} #{ordinal}", role_label(role)),
            identity_ref: format!("idp|{id}"),
            profile_ref,
            session: format!("session-{id}-0"),
        };
        store.identities.insert(
            id.clone(),
            Identity {
                actor: actor.clone(),
                email,
                calls_since_refresh: 0,
            },
        );
        debug!(actor_id = %id, role = %role, "identity created");
        Ok(actor)
    }

    fn destroy_identity(&self, actor: &Actor) -> Result<()> {
        let mut store = self.store.borrow_mut();
        store.check_injected("destroy_identity")?;
        store
            .identities
            .remove(&actor.id)
            .ok_or_else(|| anyhow!("unknown actor {}", actor.id))?;
        debug!(actor_id = %actor.id, "identity destroyed");
        Ok(())
    }

    fn refresh_session(&self, actor: &Actor) -> Result<String> {
        let mut store = self.store.borrow_mut();
        store.check_injected("refresh_session")?;
        let identity = store
            .identities
            .get_mut(&actor.id)
            .ok_or_else(|| anyhow!("unknown actor {}", actor.id))?;
        let generation = identity
            .actor
            .session
            .rsplit('-')
            .next()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);
        identity.actor.session = format!("session-{}-{}", actor.id, generation + 1);
        identity.calls_since_refresh = 0;
        Ok(identity.actor.session.clone())
    }
}

impl ToolSurface for InMemoryBackend {
    fn create_job(&self, actor: &Actor, request: &NewJob) -> Result<Job> {
        let mut store = self.store.borrow_mut();
        store.check_injected("create_job")?;
        store.authorize(actor)?;
        if !actor.role.is_job_poster() {
            bail!("{} cannot post jobs", actor.role);
        }
        if request.budget <= 0.0 {
            bail!("job budget must be positive");
        }
        let job = Job {
            id: store.next_id("job"),
            title: request.title.clone(),
            category: request.category.clone(),
            status: JobStatus::Open,
            poster_id: actor.id.clone(),
            budget: request.budget,
            created_at: Utc::now(),
        };
        store.jobs.push(job.clone());
        trace!(job_id = %job.id, "job stored");
        Ok(job)
    }

    fn fetch_matching_jobs(&self, actor: &Actor, category: Option<&str>) -> Result<Vec<Job>> {
        let mut store = self.store.borrow_mut();
        store.check_injected("fetch_matching_jobs")?;
        store.authorize(actor)?;
        Ok(store
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Open && job.poster_id != actor.id)
            .filter(|job| category.is_none_or(|category| job.category == category))
            .cloned()
            .collect())
    }

    fn submit_application(&self, actor: &Actor, request: &NewApplication) -> Result<Application> {
        let mut store = self.store.borrow_mut();
        store.check_injected("submit_application")?;
        store.authorize(actor)?;
        if !actor.role.is_service_provider() {
            bail!("{} cannot apply to jobs", actor.role);
        }
        let job = store.job_mut(&request.job_id)?;
        if job.status != JobStatus::Open {
            bail!("job {} is not open", request.job_id);
        }
        if job.poster_id == actor.id {
            bail!("cannot apply to own job {}", request.job_id);
        }
        let application = Application {
            id: store.next_id("application"),
            job_id: request.job_id.clone(),
            applicant_id: actor.id.clone(),
            profile_ref: actor.profile_ref.clone(),
            status: ApplicationStatus::UnderReview,
            estimated_cost: request.estimated_cost,
            created_at: Utc::now(),
        };
        store.applications.push(application.clone());
        Ok(application)
    }

    /// Returns applications for an owned job; fetching marks `UR` ones as viewed.
    fn fetch_applications(&self, actor: &Actor, job_id: &str) -> Result<Vec<Application>> {
        let mut store = self.store.borrow_mut();
        store.check_injected("fetch_applications")?;
        store.authorize(actor)?;
        store.owned_job(actor, job_id)?;
        for application in store
            .applications
            .iter_mut()
            .filter(|application| application.job_id == job_id)
        {
            if application.status == ApplicationStatus::UnderReview {
                application.status = ApplicationStatus::Viewed;
            }
        }
        Ok(store
            .applications
            .iter()
            .filter(|application| application.job_id == job_id)
            .cloned()
            .collect())
    }

    fn update_application_status(
        &self,
        actor: &Actor,
        application_id: &str,
        status: ApplicationStatus,
    ) -> Result<Application> {
        let mut store = self.store.borrow_mut();
        store.check_injected("update_application_status")?;
        store.authorize(actor)?;
        let job_id = store
            .applications
            .iter()
            .find(|application| application.id == application_id)
            .map(|application| application.job_id.clone())
            .ok_or_else(|| anyhow!("application {application_id} not found"))?;
        store.owned_job(actor, &job_id)?;
        store.set_application_status(application_id, status);
        store
            .applications
            .iter()
            .find(|application| application.id == application_id)
            .cloned()
            .ok_or_else(|| anyhow!("application {application_id} not found"))
    }

    fn create_offer(&self, actor: &Actor, request: &NewOffer) -> Result<Offer> {
        let mut store = self.store.borrow_mut();
        store.check_injected("create_offer")?;
        store.authorize(actor)?;
        let job = store.owned_job(actor, &request.job_id)?;
        if job.status != JobStatus::Open {
            bail!("job {} is not open", request.job_id);
        }
        if !store.identities.contains_key(&request.provider_id) {
            bail!("provider {} not found", request.provider_id);
        }
        if store
            .offers
            .iter()
            .any(|offer| offer.job_id == request.job_id && offer.status.is_live())
        {
            bail!("job {} already has an active offer", request.job_id);
        }
        let offer = Offer {
            id: store.next_id("offer"),
            job_id: request.job_id.clone(),
            application_id: request.application_id.clone(),
            poster_id: actor.id.clone(),
            provider_id: request.provider_id.clone(),
            status: OfferStatus::Pending,
            budget: request.budget,
            created_at: Utc::now(),
        };
        store.offers.push(offer.clone());
        Ok(offer)
    }

    fn fetch_offers(&self, actor: &Actor, status: Option<OfferStatus>) -> Result<Vec<Offer>> {
        let mut store = self.store.borrow_mut();
        store.check_injected("fetch_offers")?;
        store.authorize(actor)?;
        Ok(store
            .offers
            .iter()
            .filter(|offer| offer.poster_id == actor.id || offer.provider_id == actor.id)
            .filter(|offer| status.is_none_or(|status| offer.status == status))
            .cloned()
            .collect())
    }

    fn respond_to_offer(&self, actor: &Actor, offer_id: &str, accept: bool) -> Result<Offer> {
        let mut store = self.store.borrow_mut();
        store.check_injected("respond_to_offer")?;
        store.authorize(actor)?;
        let index = store.offer_index(offer_id)?;
        let offer = &store.offers[index];
        if offer.provider_id != actor.id {
            bail!("offer {offer_id} is not addressed to {}", actor.id);
        }
        if offer.status != OfferStatus::Pending {
            bail!("offer {offer_id} is {}, not PENDING", offer.status.as_str());
        }
        let job_id = offer.job_id.clone();
        let application_id = offer.application_id.clone();

        if accept {
            store.offers[index].status = OfferStatus::Accepted;
            store.job_mut(&job_id)?.status = JobStatus::InProgress;
            if let Some(application_id) = application_id {
                store.set_application_status(&application_id, ApplicationStatus::Accepted);
            }
        } else {
            store.offers[index].status = OfferStatus::Rejected;
        }
        Ok(store.offers[index].clone())
    }

    fn complete_offer(&self, actor: &Actor, offer_id: &str) -> Result<Offer> {
        let mut store = self.store.borrow_mut();
        store.check_injected("complete_offer")?;
        store.authorize(actor)?;
        let index = store.offer_index(offer_id)?;
        let offer = &store.offers[index];
        if offer.poster_id != actor.id {
            bail!("offer {offer_id} was not made by {}", actor.id);
        }
        if offer.status != OfferStatus::Accepted {
            bail!("offer {offer_id} is {}, not ACCEPTED", offer.status.as_str());
        }
        let job_id = offer.job_id.clone();
        store.offers[index].status = OfferStatus::Completed;
        store.job_mut(&job_id)?.status = JobStatus::Completed;
        for application in store
            .applications
            .iter_mut()
            .filter(|application| application.job_id == job_id)
        {
            if application.status != ApplicationStatus::Accepted {
                application.status = ApplicationStatus::Closed;
            }
        }
        Ok(store.offers[index].clone())
    }

    fn create_review(&self, actor: &Actor, request: &NewReview) -> Result<Review> {
        let mut store = self.store.borrow_mut();
        store.check_injected("create_review")?;
        store.authorize(actor)?;
        let index = store.offer_index(&request.offer_id)?;
        let offer = &store.offers[index];
        if offer.poster_id != actor.id {
            bail!("offer {} was not made by {}", request.offer_id, actor.id);
        }
        if offer.status != OfferStatus::Completed {
            bail!("offer {} is not COMPLETED", request.offer_id);
        }
        if !(1..=5).contains(&request.rating) {
            bail!("rating {} out of range 1..=5", request.rating);
        }
        let review = Review {
            id: store.next_id("review"),
            offer_id: request.offer_id.clone(),
            reviewer_id: actor.id.clone(),
            rating: request.rating,
            feedback: request.feedback.clone(),
            created_at: Utc::now(),
        };
        store.reviews.push(review.clone());
        Ok(review)
    }

    fn fetch_reviews(&self, actor: &Actor) -> Result<Vec<Review>> {
        let mut store = self.store.borrow_mut();
        store.check_injected("fetch_reviews")?;
        store.authorize(actor)?;
        let offers = &store.offers;
        Ok(store
            .reviews
            .iter()
            .filter(|review| {
                review.reviewer_id == actor.id
                    || offers
                        .iter()
                        .any(|offer| offer.id == review.offer_id && offer.provider_id == actor.id)
            })
            .cloned()
            .collect())
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::JobPosterIndividual => "Homeowner",
        Role::JobPosterOrganization => "Business",
        Role::ServiceProvider => "Provider",
        Role::Admin => "Admin",
        Role::Viewer => "Viewer",
    }
}
