//! Backend abstractions: identity provisioning and the action tool surface.
//!
//! The [`IdentityProvisioner`] and [`ToolSurface`] traits decouple the
//! simulation from the marketplace backend that actually stores records.
//! [`crate::io::memory_backend::InMemoryBackend`] implements both for local
//! runs and tests.

use std::fmt;

use anyhow::Result;

use crate::core::types::{ApplicationStatus, OfferStatus, Role};
use crate::core::world::{Actor, Application, Job, Offer, Review};

#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub title: String,
    pub category: String,
    pub budget: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub job_id: String,
    pub estimated_cost: f64,
    pub cover_note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOffer {
    pub job_id: String,
    pub application_id: Option<String>,
    pub provider_id: String,
    pub budget: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub offer_id: String,
    pub rating: u8,
    pub feedback: String,
}

/// Raised by a tool call when the actor's session credential is no longer
/// accepted. The executor refreshes the session once and retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionExpiredError {
    pub actor_id: String,
}

impl fmt::Display for SessionExpiredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session expired for actor {}", self.actor_id)
    }
}

impl std::error::Error for SessionExpiredError {}

/// Creates and destroys durable actor identities.
pub trait IdentityProvisioner {
    /// Create one identity for `role`. `ordinal` is unique per role within a run.
    fn create_identity(&self, role: Role, ordinal: usize) -> Result<Actor>;
    /// Best-effort removal; callers log failures.
    fn destroy_identity(&self, actor: &Actor) -> Result<()>;
    /// Issue a fresh session credential for an existing identity.
    fn refresh_session(&self, actor: &Actor) -> Result<String>;
}

/// One operation per marketplace action. Every call may fail independently.
pub trait ToolSurface {
    fn create_job(&self, actor: &Actor, request: &NewJob) -> Result<Job>;
    fn fetch_matching_jobs(&self, actor: &Actor, category: Option<&str>) -> Result<Vec<Job>>;
    fn submit_application(&self, actor: &Actor, request: &NewApplication) -> Result<Application>;
    fn fetch_applications(&self, actor: &Actor, job_id: &str) -> Result<Vec<Application>>;
    fn update_application_status(
        &self,
        actor: &Actor,
        application_id: &str,
        status: ApplicationStatus,
    ) -> Result<Application>;
    fn create_offer(&self, actor: &Actor, request: &NewOffer) -> Result<Offer>;
    fn fetch_offers(&self, actor: &Actor, status: Option<OfferStatus>) -> Result<Vec<Offer>>;
    fn respond_to_offer(&self, actor: &Actor, offer_id: &str, accept: bool) -> Result<Offer>;
    fn complete_offer(&self, actor: &Actor, offer_id: &str) -> Result<Offer>;
    fn create_review(&self, actor: &Actor, request: &NewReview) -> Result<Review>;
    fn fetch_reviews(&self, actor: &Actor) -> Result<Vec<Review>>;
}
