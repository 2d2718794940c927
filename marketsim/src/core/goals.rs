//! Goal evaluation and the static per-role goal lists.

use serde::Serialize;

use crate::core::types::{GoalThresholds, Role};
use crate::core::world::WorldState;

/// Aggregate counts the thresholds are compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GoalCounts {
    pub jobs: usize,
    pub applications: usize,
    pub offers: usize,
    pub reviews: usize,
}

impl GoalCounts {
    pub fn from_state(state: &WorldState) -> Self {
        Self {
            jobs: state.jobs.len(),
            applications: state.applications.len(),
            offers: state.hired_offer_count(),
            reviews: state.reviews.len(),
        }
    }
}

/// Per-threshold attainment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GoalAttainment {
    pub jobs: bool,
    pub applications: bool,
    pub offers: bool,
    pub reviews: bool,
}

impl GoalAttainment {
    pub fn all(&self) -> bool {
        self.jobs && self.applications && self.offers && self.reviews
    }
}

pub fn goal_attainment(state: &WorldState, goals: &GoalThresholds) -> GoalAttainment {
    let counts = GoalCounts::from_state(state);
    GoalAttainment {
        jobs: counts.jobs >= goals.min_jobs,
        applications: counts.applications >= goals.min_applications,
        offers: counts.offers >= goals.min_offers,
        reviews: counts.reviews >= goals.min_reviews,
    }
}

/// True iff every aggregate count meets its threshold.
pub fn goals_met(state: &WorldState, goals: &GoalThresholds) -> bool {
    goal_attainment(state, goals).all()
}

/// Natural-language goals handed to the decision service for each role.
pub fn role_goals(role: Role) -> Vec<String> {
    let goals: &[&str] = match role {
        Role::JobPosterIndividual => &[
            "Post household jobs with realistic budgets",
            "Review incoming applications promptly",
            "Hire one provider per job with a fair offer",
            "Mark finished work as completed",
            "Leave honest feedback on completed work",
        ],
        Role::JobPosterOrganization => &[
            "Keep a steady pipeline of business jobs open",
            "Shortlist strong applicants before making offers",
            "Hire one provider per job with a fair offer",
            "Close out hired jobs once the work is delivered",
            "Review every completed engagement",
        ],
        Role::ServiceProvider => &[
            "Find open jobs that match your skills",
            "Apply with a competitive estimate without spamming",
            "Respond to offers quickly",
            "Build a reputation through completed work and reviews",
        ],
        Role::Admin | Role::Viewer => &[],
    };
    goals.iter().map(|goal| goal.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OfferStatus;
    use crate::test_support::{application, job, offer, review};

    fn populated(jobs: usize, applications: usize, offers: usize, reviews: usize) -> WorldState {
        let mut state = WorldState::default();
        for index in 0..jobs {
            state.upsert_job(job(&format!("job-{index}"), "poster-1", 300.0));
        }
        for index in 0..applications {
            state.upsert_application(application(
                &format!("app-{index}"),
                "job-0",
                &format!("provider-{index}"),
                280.0,
            ));
        }
        for index in 0..offers {
            state.upsert_offer(offer(
                &format!("offer-{index}"),
                "job-0",
                "poster-1",
                "provider-1",
                OfferStatus::Completed,
            ));
        }
        for index in 0..reviews {
            state.upsert_review(review(
                &format!("review-{index}"),
                &format!("offer-{index}"),
                "poster-1",
                5,
            ));
        }
        state
    }

    #[test]
    fn goals_met_when_every_threshold_is_reached() {
        let goals = GoalThresholds {
            min_jobs: 3,
            min_applications: 5,
            min_offers: 2,
            min_reviews: 2,
        };
        assert!(goals_met(&populated(3, 5, 2, 2), &goals));
        assert!(goals_met(&populated(4, 6, 3, 2), &goals));
    }

    #[test]
    fn any_single_shortfall_fails_the_goals() {
        let goals = GoalThresholds {
            min_jobs: 3,
            min_applications: 5,
            min_offers: 2,
            min_reviews: 2,
        };
        assert!(!goals_met(&populated(2, 5, 2, 2), &goals));
        assert!(!goals_met(&populated(3, 4, 2, 2), &goals));
        assert!(!goals_met(&populated(3, 5, 1, 2), &goals));
        assert!(!goals_met(&populated(3, 5, 2, 1), &goals));
    }

    #[test]
    fn pending_and_rejected_offers_do_not_count() {
        let mut state = populated(1, 1, 0, 0);
        state.upsert_offer(offer("o-1", "job-0", "poster-1", "p", OfferStatus::Pending));
        state.upsert_offer(offer("o-2", "job-0", "poster-1", "p", OfferStatus::Rejected));
        state.upsert_offer(offer("o-3", "job-0", "poster-1", "p", OfferStatus::Accepted));
        assert_eq!(GoalCounts::from_state(&state).offers, 1);
    }

    #[test]
    fn passive_roles_have_no_goals() {
        assert!(role_goals(Role::Viewer).is_empty());
        assert!(!role_goals(Role::ServiceProvider).is_empty());
    }
}
