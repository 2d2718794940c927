//! Shared deterministic types for the simulation core.
//!
//! These types define stable contracts between the resolver, the policy, the
//! executor and the loop. They carry no I/O and serialize to stable names so
//! reports and decision-service responses can refer to them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Participant kind. Closed set: every role-specific behavior dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    JobPosterIndividual,
    JobPosterOrganization,
    ServiceProvider,
    /// Provisioned for completeness; takes no autonomous actions.
    Admin,
    /// Provisioned for completeness; takes no autonomous actions.
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::JobPosterIndividual => "job_poster_individual",
            Role::JobPosterOrganization => "job_poster_organization",
            Role::ServiceProvider => "service_provider",
            Role::Admin => "admin",
            Role::Viewer => "viewer",
        }
    }

    pub fn is_job_poster(self) -> bool {
        matches!(self, Role::JobPosterIndividual | Role::JobPosterOrganization)
    }

    pub fn is_service_provider(self) -> bool {
        self == Role::ServiceProvider
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every action an actor can take. Declaration order is the iteration order
/// of availability sets, which makes "first available" deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    CreateJob,
    ViewApplications,
    Shortlist,
    MakeOffer,
    CompleteJob,
    LeaveReview,
    BrowseJobs,
    ApplyToJob,
    ViewOffers,
    AcceptOffer,
    RejectOffer,
    ViewReviews,
}

impl ActionName {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionName::CreateJob => "create_job",
            ActionName::ViewApplications => "view_applications",
            ActionName::Shortlist => "shortlist",
            ActionName::MakeOffer => "make_offer",
            ActionName::CompleteJob => "complete_job",
            ActionName::LeaveReview => "leave_review",
            ActionName::BrowseJobs => "browse_jobs",
            ActionName::ApplyToJob => "apply_to_job",
            ActionName::ViewOffers => "view_offers",
            ActionName::AcceptOffer => "accept_offer",
            ActionName::RejectOffer => "reject_offer",
            ActionName::ViewReviews => "view_reviews",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let name = match raw.trim() {
            "create_job" => ActionName::CreateJob,
            "view_applications" => ActionName::ViewApplications,
            "shortlist" => ActionName::Shortlist,
            "make_offer" => ActionName::MakeOffer,
            "complete_job" => ActionName::CompleteJob,
            "leave_review" => ActionName::LeaveReview,
            "browse_jobs" => ActionName::BrowseJobs,
            "apply_to_job" => ActionName::ApplyToJob,
            "view_offers" => ActionName::ViewOffers,
            "accept_offer" => ActionName::AcceptOffer,
            "reject_offer" => ActionName::RejectOffer,
            "view_reviews" => ActionName::ViewReviews,
            other => return Err(format!("unknown action '{other}'")),
        };
        Ok(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Open,
    InProgress,
    Completed,
    Closed,
}

/// Application status codes as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "IP")]
    InProgress,
    #[serde(rename = "CL")]
    Closed,
    #[serde(rename = "UR")]
    UnderReview,
    #[serde(rename = "SL")]
    Shortlisted,
    #[serde(rename = "VW")]
    Viewed,
    #[serde(rename = "AC")]
    Accepted,
}

impl ApplicationStatus {
    pub fn code(self) -> &'static str {
        match self {
            ApplicationStatus::InProgress => "IP",
            ApplicationStatus::Closed => "CL",
            ApplicationStatus::UnderReview => "UR",
            ApplicationStatus::Shortlisted => "SL",
            ApplicationStatus::Viewed => "VW",
            ApplicationStatus::Accepted => "AC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Withdrawn,
    Expired,
}

impl OfferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OfferStatus::Pending => "PENDING",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Rejected => "REJECTED",
            OfferStatus::Completed => "COMPLETED",
            OfferStatus::Withdrawn => "WITHDRAWN",
            OfferStatus::Expired => "EXPIRED",
        }
    }

    /// Offers that still bind their job (block further offers on it).
    pub fn is_live(self) -> bool {
        matches!(
            self,
            OfferStatus::Pending | OfferStatus::Accepted | OfferStatus::Completed
        )
    }
}

/// Overall run status. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Aggregate thresholds the run tries to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalThresholds {
    pub min_jobs: usize,
    pub min_applications: usize,
    /// Offers counted when ACCEPTED or COMPLETED.
    pub min_offers: usize,
    pub min_reviews: usize,
}

impl Default for GoalThresholds {
    fn default() -> Self {
        Self {
            min_jobs: 3,
            min_applications: 5,
            min_offers: 2,
            min_reviews: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_parse_their_own_display() {
        let all = [
            ActionName::CreateJob,
            ActionName::ViewApplications,
            ActionName::Shortlist,
            ActionName::MakeOffer,
            ActionName::CompleteJob,
            ActionName::LeaveReview,
            ActionName::BrowseJobs,
            ActionName::ApplyToJob,
            ActionName::ViewOffers,
            ActionName::AcceptOffer,
            ActionName::RejectOffer,
            ActionName::ViewReviews,
        ];
        for name in all {
            assert_eq!(name.to_string().parse::<ActionName>(), Ok(name));
        }
        assert!("hire_everyone".parse::<ActionName>().is_err());
    }

    #[test]
    fn application_status_serializes_as_backend_code() {
        let raw = serde_json::to_string(&ApplicationStatus::UnderReview).expect("serialize");
        assert_eq!(raw, "\"UR\"");
        assert_eq!(ApplicationStatus::Shortlisted.code(), "SL");
    }

    #[test]
    fn only_posters_and_providers_have_behavior_roles() {
        assert!(Role::JobPosterOrganization.is_job_poster());
        assert!(Role::ServiceProvider.is_service_provider());
        assert!(!Role::Admin.is_job_poster() && !Role::Admin.is_service_provider());
    }
}
