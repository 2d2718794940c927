//! Per-actor context summary handed to the decision service.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::types::{JobStatus, Role};
use crate::core::world::{Actor, Offer, WorldState};

/// Counts describing what one actor can currently see and act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorSummary {
    pub actor_id: String,
    pub role: Role,
    /// Jobs posted by the actor (posters) or open jobs on the market (providers).
    pub jobs: usize,
    pub open_jobs: usize,
    /// Applications received (posters) or submitted (providers).
    pub applications: usize,
    /// Offers made (posters) or addressed to the actor (providers), by status.
    pub offers_by_status: BTreeMap<&'static str, usize>,
    pub reviewable_offers: usize,
    pub reviews_written: usize,
}

pub fn summarize_actor(state: &WorldState, actor: &Actor) -> ActorSummary {
    let poster = actor.role.is_job_poster();
    let (jobs, open_jobs) = if poster {
        let own: Vec<_> = state.jobs_posted_by(&actor.id).collect();
        let open = own.iter().filter(|job| job.status == JobStatus::Open).count();
        (own.len(), open)
    } else {
        let open = state
            .jobs
            .iter()
            .filter(|job| job.status == JobStatus::Open)
            .count();
        (state.jobs.len(), open)
    };
    let applications = if poster {
        state.applications_received(&actor.id).count()
    } else {
        state.applications_by(&actor.id).count()
    };

    let mut offers_by_status = BTreeMap::new();
    let relevant = |offer: &&Offer| {
        if poster {
            offer.poster_id == actor.id
        } else {
            offer.provider_id == actor.id
        }
    };
    for offer in state.offers.iter().filter(relevant) {
        *offers_by_status.entry(offer.status.as_str()).or_insert(0) += 1;
    }

    ActorSummary {
        actor_id: actor.id.clone(),
        role: actor.role,
        jobs,
        open_jobs,
        applications,
        offers_by_status,
        reviewable_offers: state.reviewable_offers(&actor.id).count(),
        reviews_written: state
            .reviews
            .iter()
            .filter(|review| review.reviewer_id == actor.id)
            .count(),
    }
}

impl ActorSummary {
    /// Plain-text rendering, one fact per line.
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("role: {}", self.role),
            format!("jobs: {} ({} open)", self.jobs, self.open_jobs),
            format!("applications: {}", self.applications),
        ];
        if self.offers_by_status.is_empty() {
            lines.push("offers: none".to_string());
        } else {
            let parts: Vec<String> = self
                .offers_by_status
                .iter()
                .map(|(status, count)| format!("{status}={count}"))
                .collect();
            lines.push(format!("offers: {}", parts.join(", ")));
        }
        lines.push(format!("offers awaiting review: {}", self.reviewable_offers));
        lines.push(format!("reviews written: {}", self.reviews_written));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OfferStatus;
    use crate::test_support::{application, job, offer, poster, provider};

    #[test]
    fn poster_summary_counts_own_entities_only() {
        let mut state = WorldState::default();
        state.upsert_job(job("job-1", "poster-1", 300.0));
        state.upsert_job(job("job-2", "poster-2", 300.0));
        state.upsert_application(application("app-1", "job-1", "provider-1", 280.0));
        state.upsert_offer(offer(
            "offer-1",
            "job-1",
            "poster-1",
            "provider-1",
            OfferStatus::Pending,
        ));
        state.upsert_offer(offer(
            "offer-2",
            "job-2",
            "poster-2",
            "provider-1",
            OfferStatus::Pending,
        ));

        let summary = summarize_actor(&state, &poster("poster-1"));
        assert_eq!(summary.jobs, 1);
        assert_eq!(summary.applications, 1);
        assert_eq!(summary.offers_by_status.get("PENDING"), Some(&1));
        assert!(summary.render().contains("offers: PENDING=1"));
    }

    #[test]
    fn provider_summary_sees_market_and_own_offers() {
        let mut state = WorldState::default();
        state.upsert_job(job("job-1", "poster-1", 300.0));
        state.upsert_job(job("job-2", "poster-2", 300.0));
        state.upsert_offer(offer(
            "offer-1",
            "job-1",
            "poster-1",
            "provider-1",
            OfferStatus::Pending,
        ));

        let summary = summarize_actor(&state, &provider("provider-1"));
        assert_eq!(summary.jobs, 2);
        assert_eq!(summary.open_jobs, 2);
        assert_eq!(summary.offers_by_status.get("PENDING"), Some(&1));
        assert!(!summary.offers_by_status.contains_key("ACCEPTED"));
    }
}
