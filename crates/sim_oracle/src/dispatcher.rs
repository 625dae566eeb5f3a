//! Batched adjudication with retry, rate limiting, and fallback.
//!
//! Escalated personas are grouped into fixed-size batches. Each batch is one
//! request, retried with exponential backoff under a shared concurrency
//! permit. Personas left without a ballot after the final attempt receive a
//! deterministic fallback so the caller always gets one decision per persona.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use sim_core::entities::{
    Candidate, CandidateStatus, District, DecisionMethod, Persona, VoteDecision,
};
use sim_core::params::SimParams;

use crate::client::DecisionOracle;
use crate::prompt::{build_batch_prompt, SYSTEM_PROMPT};
use crate::protocol::parse_response;

/// Confidence attached to every fallback decision.
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Adjudicate all escalated personas of one district.
///
/// `personas` and `rule_decisions` are parallel slices: the rule-scored
/// decision at index `i` belongs to the persona at index `i` and seeds the
/// fallback when the oracle cannot answer for that slot. The returned vector
/// has the same length and order as `personas`.
pub async fn dispatch_district(
    oracle: Arc<dyn DecisionOracle>,
    district: &District,
    candidates: &[Candidate],
    personas: &[Persona],
    rule_decisions: &[VoteDecision],
    params: &SimParams,
    memory_context: &str,
    api_permits: Arc<Semaphore>,
) -> Vec<VoteDecision> {
    debug_assert_eq!(personas.len(), rule_decisions.len());

    let batch_size = params.oracle_batch_size.max(1) as usize;
    let batch_futures: Vec<_> = personas
        .chunks(batch_size)
        .map(|chunk| {
            adjudicate_batch(
                Arc::clone(&oracle),
                district,
                candidates,
                chunk,
                params,
                memory_context,
                Arc::clone(&api_permits),
            )
        })
        .collect();
    let batch_results = join_all(batch_futures).await;

    let mut slots: Vec<Option<VoteDecision>> = vec![None; personas.len()];
    for (batch_idx, parsed) in batch_results.into_iter().enumerate() {
        let offset = batch_idx * batch_size;
        for (local, decision) in parsed {
            slots[offset + local] = Some(decision);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.unwrap_or_else(|| fallback_decision(&personas[i], &rule_decisions[i], candidates))
        })
        .collect()
}

/// One batch, one request, up to `oracle_retries` attempts.
///
/// Returns `(local_slot, decision)` pairs; an empty vector means the batch
/// exhausted its retries and falls back entirely.
async fn adjudicate_batch(
    oracle: Arc<dyn DecisionOracle>,
    district: &District,
    candidates: &[Candidate],
    chunk: &[Persona],
    params: &SimParams,
    memory_context: &str,
    api_permits: Arc<Semaphore>,
) -> Vec<(usize, VoteDecision)> {
    let user_prompt = build_batch_prompt(district, candidates, chunk, memory_context);

    for attempt in 0..params.oracle_retries {
        let outcome = {
            let permit = api_permits.acquire().await;
            if permit.is_err() {
                // Semaphore closed: the run is shutting down.
                return Vec::new();
            }
            oracle.adjudicate(SYSTEM_PROMPT, &user_prompt).await
        };

        match outcome.and_then(|text| parse_response(&text, chunk, candidates)) {
            Ok(parsed) => {
                debug!(
                    district = %district.id,
                    batch = chunk.len(),
                    answered = parsed.len(),
                    "batch adjudicated"
                );
                sleep(Duration::from_millis(params.inter_batch_delay_ms)).await;
                return parsed;
            }
            Err(err) => {
                warn!(
                    district = %district.id,
                    attempt = attempt + 1,
                    %err,
                    "batch attempt failed"
                );
                sleep(Duration::from_secs(1u64 << attempt)).await;
            }
        }
    }

    warn!(district = %district.id, batch = chunk.len(), "batch exhausted retries, falling back");
    Vec::new()
}

/// Deterministic stand-in when the oracle never answers for a persona.
///
/// Prefers the rule-scored ballot; without one, votes for the incumbent
/// (or the first rostered candidate).
fn fallback_decision(
    persona: &Persona,
    rule: &VoteDecision,
    candidates: &[Candidate],
) -> VoteDecision {
    if rule.will_vote && rule.smd_candidate.is_some() {
        let mut decision = rule.clone();
        decision.method = DecisionMethod::Fallback;
        decision.confidence = FALLBACK_CONFIDENCE;
        return decision;
    }

    let pick = candidates
        .iter()
        .find(|c| c.status == CandidateStatus::Incumbent)
        .or_else(|| candidates.first());
    match pick {
        Some(c) => VoteDecision::ballot(
            persona.id.clone(),
            persona.swing,
            DecisionMethod::Fallback,
            Some(c.id.clone()),
            Some(c.party.clone()),
            Some(c.party.clone()),
            FALLBACK_CONFIDENCE,
        ),
        None => {
            let mut decision = rule.clone();
            decision.method = DecisionMethod::Fallback;
            decision
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockOracle;
    use sim_core::entities::{
        EducationLevel, Engagement, Gender, HouseholdType, Ideology, IncomeBracket,
        IndustrySector, PartyAffinity, SwingLevel, Urbanization,
    };
    use sim_core::ids::{DistrictId, PersonaId};
    use std::collections::BTreeMap;

    fn test_district() -> District {
        District {
            id: "13_5".parse().unwrap(),
            name: "Metro 5th".into(),
            block: "metro".parse().unwrap(),
            age_bands: [0.15; 6],
            male_ratio: 0.49,
            industry: [0.02, 0.18, 0.80],
            households: [0.2; 5],
            income_level: IncomeBracket::High,
            university_rate: 0.5,
            urbanization: Urbanization::Metropolis,
            party_support: BTreeMap::new(),
            floating_ratio: 0.5,
            regional_issues: vec![],
            historical_turnout: 0.52,
        }
    }

    fn test_candidates() -> Vec<Candidate> {
        vec![
            Candidate {
                id: "c-sato".parse().unwrap(),
                name: "Sato".into(),
                district: "13_5".parse().unwrap(),
                party: "alpha".parse().unwrap(),
                status: CandidateStatus::Incumbent,
                previous_wins: 2,
                dual_candidacy: false,
            },
            Candidate {
                id: "c-ito".parse().unwrap(),
                name: "Ito".into(),
                district: "13_5".parse().unwrap(),
                party: "beta".parse().unwrap(),
                status: CandidateStatus::New,
                previous_wins: 0,
                dual_candidacy: true,
            },
        ]
    }

    fn test_persona(n: u32) -> Persona {
        let district: DistrictId = "13_5".parse().unwrap();
        Persona {
            id: PersonaId::new(&district, n),
            district,
            age: 40,
            gender: Gender::Male,
            occupation: "office worker".into(),
            sector: IndustrySector::Tertiary,
            household: HouseholdType::Couple,
            income: IncomeBracket::Middle,
            education: EducationLevel::University,
            urbanization: Urbanization::Metropolis,
            ideology: Ideology::Centrist,
            engagement: Engagement::Moderate,
            affinity: PartyAffinity::Undecided,
            swing: SwingLevel::High,
            turnout_probability: 0.6,
            concerns: vec!["commute costs".into()],
            info_sources: vec!["online news".into()],
        }
    }

    fn rule_ballot(persona: &Persona, candidate: &Candidate) -> VoteDecision {
        VoteDecision::ballot(
            persona.id.clone(),
            persona.swing,
            DecisionMethod::Rule,
            Some(candidate.id.clone()),
            Some(candidate.party.clone()),
            Some(candidate.party.clone()),
            0.7,
        )
    }

    fn quick_params() -> SimParams {
        SimParams {
            oracle_retries: 2,
            inter_batch_delay_ms: 0,
            ..SimParams::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn answered_batch_keeps_oracle_ballots() {
        let personas = vec![test_persona(1), test_persona(2)];
        let candidates = test_candidates();
        let rules: Vec<_> = personas
            .iter()
            .map(|p| rule_ballot(p, &candidates[0]))
            .collect();
        let oracle = Arc::new(MockOracle::new(vec![r#"```json
[
  {"persona_index": 2, "will_vote": false, "abstention_reason": "away on business"},
  {"persona_index": 1, "will_vote": true,
   "smd_vote": {"candidate": "Ito", "reason": "fresh face"},
   "proportional_vote": {"party": "beta"}, "confidence": 0.9}
]
```"#
            .to_string()]));

        let decisions = dispatch_district(
            oracle,
            &test_district(),
            &candidates,
            &personas,
            &rules,
            &quick_params(),
            "",
            Arc::new(Semaphore::new(2)),
        )
        .await;

        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].method, DecisionMethod::Oracle);
        assert_eq!(decisions[0].smd_candidate, Some("c-ito".parse().unwrap()));
        assert!(!decisions[1].will_vote);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fall_back_to_rule_ballots() {
        let personas = vec![test_persona(1)];
        let candidates = test_candidates();
        let rules = vec![rule_ballot(&personas[0], &candidates[1])];
        let oracle = Arc::new(MockOracle::new(Vec::new()).failing_first(5));

        let decisions = dispatch_district(
            oracle.clone(),
            &test_district(),
            &candidates,
            &personas,
            &rules,
            &quick_params(),
            "",
            Arc::new(Semaphore::new(1)),
        )
        .await;

        assert_eq!(oracle.call_count(), 2);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].method, DecisionMethod::Fallback);
        assert_eq!(decisions[0].confidence, FALLBACK_CONFIDENCE);
        assert_eq!(decisions[0].smd_candidate, Some("c-ito".parse().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_slot_falls_back_to_incumbent_when_rule_abstained() {
        let personas = vec![test_persona(1), test_persona(2)];
        let candidates = test_candidates();
        let rules = vec![
            rule_ballot(&personas[0], &candidates[0]),
            VoteDecision::abstain(personas[1].id.clone(), personas[1].swing, "busy".into()),
        ];
        // Answers only persona 1; persona 2's slot stays empty.
        let oracle = Arc::new(MockOracle::new(vec![r#"[
  {"persona_index": 1, "will_vote": true,
   "smd_vote": {"candidate": "Sato"}, "confidence": 0.8}
]"#
        .to_string()]));

        let decisions = dispatch_district(
            oracle,
            &test_district(),
            &candidates,
            &personas,
            &rules,
            &quick_params(),
            "",
            Arc::new(Semaphore::new(1)),
        )
        .await;

        assert_eq!(decisions[0].method, DecisionMethod::Oracle);
        assert_eq!(decisions[1].method, DecisionMethod::Fallback);
        assert!(decisions[1].will_vote);
        assert_eq!(decisions[1].smd_candidate, Some("c-sato".parse().unwrap()));
    }
}
