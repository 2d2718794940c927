//! Action policy: consult the decision service, fall back to priority tables.
//!
//! Decision service problems (unreachable, malformed reply, unavailable
//! action) are never errors here. They are logged and the deterministic
//! fallback takes over, so `decide` produces a decision whenever the actor has
//! any available action.

use std::collections::BTreeSet;

use rand::Rng;
use tracing::{debug, instrument};

use crate::core::availability::available_actions;
use crate::core::catalog::JobTemplate;
use crate::core::policy::{
    Decision, DecisionSource, fallback_decision, params_from_suggestion, synthesize_params,
};
use crate::core::types::ActionName;
use crate::core::world::{Actor, WorldState};
use crate::io::decision::{ChatOptions, DecisionService, parse_reply};
use crate::io::prompt::build_decision_prompt;

/// Decision service plus the sampling settings used with it.
#[derive(Clone, Copy)]
pub struct LlmAdvisor<'a> {
    pub service: &'a dyn DecisionService,
    pub temperature: f32,
}

/// Outcome of asking the decision service.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmDecision {
    Suggested(Decision),
    /// The service could not be used this turn; carries the reason.
    Unavailable(String),
}

/// Choose one action for `actor`, or `None` if it has nothing to do.
#[instrument(skip_all, fields(actor_id = %actor.id, role = %actor.role))]
pub fn decide<R: Rng>(
    state: &WorldState,
    actor: &Actor,
    catalog: &[JobTemplate],
    advisor: Option<LlmAdvisor<'_>>,
    rng: &mut R,
) -> Option<Decision> {
    let available = available_actions(state, actor);
    if available.is_empty() {
        debug!("no available actions");
        return None;
    }

    if let Some(advisor) = advisor {
        match consult(state, actor, &available, catalog, advisor, rng) {
            LlmDecision::Suggested(decision) => {
                debug!(action = %decision.action, "decision service suggestion accepted");
                return Some(decision);
            }
            LlmDecision::Unavailable(reason) => {
                debug!(%reason, "falling back to priority table");
            }
        }
    }

    let decision = fallback_decision(state, actor, &available, catalog, rng)?;
    debug!(action = %decision.action, has_params = decision.params.is_some(), "fallback decision");
    Some(decision)
}

/// Ask the decision service for a suggestion and validate it against state.
pub fn consult<R: Rng>(
    state: &WorldState,
    actor: &Actor,
    available: &BTreeSet<ActionName>,
    catalog: &[JobTemplate],
    advisor: LlmAdvisor<'_>,
    rng: &mut R,
) -> LlmDecision {
    let prompt = match build_decision_prompt(state, actor, available) {
        Ok(prompt) => prompt,
        Err(err) => return LlmDecision::Unavailable(format!("prompt: {err:#}")),
    };
    let options = ChatOptions {
        system_prompt: prompt.system,
        temperature: advisor.temperature,
    };
    let raw = match advisor.service.chat(&prompt.user, &options) {
        Ok(raw) => raw,
        Err(err) => return LlmDecision::Unavailable(format!("chat: {err:#}")),
    };
    let reply = match parse_reply(&raw) {
        Ok(reply) => reply,
        Err(err) => return LlmDecision::Unavailable(format!("reply: {err:#}")),
    };
    let action: ActionName = match reply.action.parse() {
        Ok(action) => action,
        Err(err) => return LlmDecision::Unavailable(err),
    };
    if !available.contains(&action) {
        return LlmDecision::Unavailable(format!("suggested {action} is not available"));
    }

    let params = reply
        .params
        .as_ref()
        .and_then(|suggested| params_from_suggestion(state, actor, action, suggested))
        .or_else(|| synthesize_params(state, actor, action, catalog, rng));
    LlmDecision::Suggested(Decision {
        action,
        reasoning: reply.reasoning,
        params,
        source: DecisionSource::Llm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::default_catalog;
    use crate::core::policy::ActionParams;
    use crate::core::types::OfferStatus;
    use crate::test_support::{
        FailingDecisionService, ScriptedDecisionService, job, offer, poster, provider, seeded_rng,
    };

    fn market() -> (WorldState, Actor) {
        let mut state = WorldState::default();
        let provider = provider("provider-1");
        state.add_actor(poster("poster-1"));
        state.add_actor(provider.clone());
        state.upsert_job(job("job-1", "poster-1", 300.0));
        (state, provider)
    }

    fn advisor(service: &dyn DecisionService) -> Option<LlmAdvisor<'_>> {
        Some(LlmAdvisor {
            service,
            temperature: 0.2,
        })
    }

    #[test]
    fn valid_suggestion_is_used_with_its_params() {
        let (state, provider) = market();
        let service = ScriptedDecisionService::new([
            r#"{"action": "apply_to_job", "reasoning": "fits my skills", "params": {"job_id": "job-1", "estimated_cost": 275.5}}"#,
        ]);
        let decision = decide(
            &state,
            &provider,
            &default_catalog(),
            advisor(&service),
            &mut seeded_rng(1),
        )
        .expect("decision");
        assert_eq!(decision.source, DecisionSource::Llm);
        assert_eq!(decision.reasoning, "fits my skills");
        assert!(matches!(
            decision.params,
            Some(ActionParams::ApplyToJob { ref job_id, estimated_cost, .. })
                if job_id == "job-1" && estimated_cost == 275.5
        ));
        assert_eq!(service.prompts().len(), 1);
    }

    #[test]
    fn unavailable_suggestion_falls_back() {
        let (state, provider) = market();
        let service =
            ScriptedDecisionService::new([r#"{"action": "accept_offer", "reasoning": "take it"}"#]);
        let decision = decide(
            &state,
            &provider,
            &default_catalog(),
            advisor(&service),
            &mut seeded_rng(1),
        )
        .expect("decision");
        assert_eq!(decision.source, DecisionSource::Fallback);
        assert_eq!(decision.action, ActionName::ApplyToJob);
    }

    #[test]
    fn service_failure_falls_back_without_touching_state() {
        let (state, provider) = market();
        let before = state.clone();
        let decision = decide(
            &state,
            &provider,
            &default_catalog(),
            advisor(&FailingDecisionService),
            &mut seeded_rng(1),
        )
        .expect("decision");
        assert_eq!(decision.source, DecisionSource::Fallback);
        assert_eq!(state, before);
    }

    #[test]
    fn malformed_reply_falls_back() {
        let (state, provider) = market();
        let service = ScriptedDecisionService::new(["I think you should apply."]);
        let decision = decide(
            &state,
            &provider,
            &default_catalog(),
            advisor(&service),
            &mut seeded_rng(1),
        )
        .expect("decision");
        assert_eq!(decision.source, DecisionSource::Fallback);
    }

    #[test]
    fn bad_suggested_ids_are_replaced_by_synthesized_params() {
        let (mut state, provider) = market();
        state.upsert_offer(offer(
            "offer-1",
            "job-1",
            "poster-1",
            "provider-1",
            OfferStatus::Pending,
        ));
        let service = ScriptedDecisionService::new([
            r#"{"action": "accept_offer", "reasoning": "good rate", "params": {"offer_id": "offer-404"}}"#,
        ]);
        let decision = decide(
            &state,
            &provider,
            &default_catalog(),
            advisor(&service),
            &mut seeded_rng(1),
        )
        .expect("decision");
        assert_eq!(decision.source, DecisionSource::Llm);
        assert_eq!(
            decision.params,
            Some(ActionParams::AcceptOffer {
                offer_id: "offer-1".to_string()
            })
        );
    }

    #[test]
    fn no_available_actions_means_no_decision() {
        let mut state = WorldState::default();
        let viewer = crate::test_support::actor("viewer-1", crate::core::types::Role::Viewer);
        state.add_actor(viewer.clone());
        assert!(decide(&state, &viewer, &default_catalog(), None, &mut seeded_rng(1)).is_none());
    }
}
