//! Rule-based turnout and vote-choice model.
//!
//! Low-volatility personas get a fully deterministic scored decision here.
//! Personas at `Moderate` swing or above are flagged for oracle adjudication;
//! their scored decision is kept as the fallback if the oracle path fails.

use sim_core::entities::{
    AlignmentTable, Candidate, CandidateStatus, District, Engagement, IncomeBracket, Persona,
    PartyAffinity, VoteDecision,
};
use sim_core::ids::PartyId;
use sim_core::params::SimParams;
use sim_core::rng::SimRng;

/// Scored outcome plus the escalation flag consumed by the dispatcher.
#[derive(Clone, Debug)]
pub struct ScoredDecision {
    pub decision: VoteDecision,
    pub needs_oracle: bool,
}

/// Read-only per-district context shared by every persona decision.
pub struct DecisionContext<'a> {
    pub district: &'a District,
    pub candidates: &'a [Candidate],
    pub alignment: &'a AlignmentTable,
    pub params: &'a SimParams,
    /// Negative in bad weather; feeds abstention-reason wording only
    /// (turnout probability already carries the modifier).
    pub weather_modifier: f64,
}

/// Decide one persona: turnout draw first, then the six-factor score.
pub fn decide_persona(
    persona: &Persona,
    ctx: &DecisionContext<'_>,
    rng: &mut SimRng,
) -> ScoredDecision {
    if rng.next_f64() >= persona.turnout_probability {
        let reason = abstention_reason(persona, ctx.weather_modifier, rng);
        return ScoredDecision {
            decision: VoteDecision::abstain(persona.id.clone(), persona.swing, reason),
            needs_oracle: false,
        };
    }

    let needs_oracle = persona.swing.needs_oracle();

    if ctx.candidates.is_empty() {
        // Blank district-seat ballot; the list ballot is blank too.
        return ScoredDecision {
            decision: VoteDecision::ballot(
                persona.id.clone(),
                persona.swing,
                sim_core::entities::DecisionMethod::Rule,
                None,
                None,
                None,
                0.0,
            ),
            needs_oracle: false,
        };
    }

    let noise = (persona.swing.noise_sigma() + ctx.params.swing_noise_offset).max(0.0);

    // Base scores in roster order, then independent Gaussian noise.
    let scores: Vec<f64> = ctx
        .candidates
        .iter()
        .map(|c| candidate_score(persona, c, ctx))
        .collect();
    let noisy: Vec<f64> = scores.iter().map(|s| s + rng.gauss(0.0, noise)).collect();

    // Argmax; first in roster order wins exact ties.
    let mut best = 0;
    for (i, v) in noisy.iter().enumerate().skip(1) {
        if *v > noisy[best] {
            best = i;
        }
    }
    let winner = &ctx.candidates[best];

    let confidence = if noisy.len() >= 2 {
        let mut sorted = noisy.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        ((sorted[0] - sorted[1]) * 2.0).clamp(0.1, 1.0)
    } else {
        0.8
    };
    let confidence = (confidence * 1000.0).round() / 1000.0;

    let proportional = proportional_party(persona, &winner.party, ctx, noise, rng);

    ScoredDecision {
        decision: VoteDecision::ballot(
            persona.id.clone(),
            persona.swing,
            sim_core::entities::DecisionMethod::Rule,
            Some(winner.id.clone()),
            Some(winner.party.clone()),
            Some(proportional),
            confidence,
        ),
        needs_oracle,
    }
}

/// Weighted six-factor score for one candidate.
fn candidate_score(persona: &Persona, candidate: &Candidate, ctx: &DecisionContext<'_>) -> f64 {
    let w = &ctx.params.weights;

    // Factor 1: party loyalty.
    let loyalty = if persona.affinity.matches(&candidate.party) {
        1.0
    } else if persona.affinity == PartyAffinity::Undecided {
        ctx.params.independent_loyalty
    } else {
        0.1
    };

    // Factor 2: policy alignment from the cohort table.
    let policy = ctx.alignment.score(persona.ideology, &candidate.party);

    // Factor 3: candidate appeal, incumbency and prior-win bonuses capped.
    let mut appeal = 0.3;
    match candidate.status {
        CandidateStatus::Incumbent => appeal += 0.3,
        CandidateStatus::Former => appeal += 0.15,
        CandidateStatus::New => {}
    }
    appeal += (candidate.previous_wins as f64 * 0.05).min(0.2);

    // Factor 4: media influence, proxied by district support for the party.
    let media = match ctx.district.party_support.get(&candidate.party) {
        Some(&s) => s,
        None => 0.1,
    };

    // Factor 5: local connection.
    let mut local = 0.3;
    if candidate.status == CandidateStatus::Incumbent {
        local += 0.3;
    }

    // Factor 6: strategic viability.
    let mut strategic = 0.5;
    if candidate.status == CandidateStatus::Incumbent {
        strategic += 0.2;
    }
    if candidate.dual_candidacy {
        strategic -= 0.1;
    }

    w.party_loyalty * loyalty
        + w.policy_alignment * policy
        + w.candidate_appeal * appeal
        + w.media_influence * media
        + w.local_connection * local
        + w.strategic_voting * strategic
}

/// List-ballot party: follows the district-seat party unless a split-ticket
/// draw (probability proportional to the noise level) reroutes it through
/// the cohort alignment scores.
fn proportional_party(
    persona: &Persona,
    smd_party: &PartyId,
    ctx: &DecisionContext<'_>,
    noise: f64,
    rng: &mut SimRng,
) -> PartyId {
    let split_prob = noise * 0.5;
    if rng.next_f64() < split_prob {
        if let Some(cohort) = ctx.alignment.cohort(persona.ideology) {
            let mut best: Option<(&PartyId, f64)> = None;
            for (party, score) in cohort {
                let jittered = score + rng.gauss(0.0, 0.1);
                match best {
                    Some((_, b)) if jittered <= b => {}
                    _ => best = Some((party, jittered)),
                }
            }
            if let Some((party, _)) = best {
                return party.clone();
            }
        }
    }
    smd_party.clone()
}

/// Human-readable abstention reason conditioned on engagement, age, income
/// and weather severity.
fn abstention_reason(persona: &Persona, weather_modifier: f64, rng: &mut SimRng) -> String {
    if weather_modifier <= -0.08 {
        return "could not reach the polling station in heavy snow".to_string();
    }
    let pool: &[&str] = match persona.engagement {
        Engagement::Low => &[
            "not interested in politics",
            "voting would not change anything",
            "work kept me from the polls",
            "polling station is too far",
            "no candidate worth supporting",
        ],
        Engagement::Moderate => &[
            "stayed in because of bad weather",
            "no candidate worth supporting",
            "forgot to vote early",
            "feeling unwell",
        ],
        Engagement::High => &[
            "too unwell to go out",
            "urgent family matter came up",
            "travelling on election day",
        ],
    };
    let mut reason = rng
        .choose(pool)
        .copied()
        .unwrap_or("did not vote")
        .to_string();
    if persona.engagement == Engagement::Low
        && persona.income == IncomeBracket::Low
        && persona.age < 60
        && reason == "not interested in politics"
    {
        reason = "work kept me from the polls".to_string();
    }
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use sim_core::entities::{
        EducationLevel, Gender, HouseholdType, Ideology, IndustrySector, SwingLevel, Urbanization,
    };
    use sim_core::ids::{CandidateId, DistrictId, PersonaId};

    fn district() -> District {
        let mut support = BTreeMap::new();
        support.insert("alpha".parse().unwrap(), 0.35);
        support.insert("beta".parse().unwrap(), 0.20);
        District {
            id: "01_1".parse().unwrap(),
            name: "North 1st".into(),
            block: "north".parse().unwrap(),
            age_bands: [0.1, 0.12, 0.16, 0.18, 0.22, 0.22],
            male_ratio: 0.48,
            industry: [0.10, 0.20, 0.70],
            households: [0.3, 0.25, 0.3, 0.05, 0.1],
            income_level: IncomeBracket::Middle,
            university_rate: 0.3,
            urbanization: Urbanization::ProvincialCity,
            party_support: support,
            floating_ratio: 0.45,
            regional_issues: vec!["regional revival".into()],
            historical_turnout: 0.55,
        }
    }

    fn candidate(id: &str, party: &str, status: CandidateStatus) -> Candidate {
        Candidate {
            id: id.parse().unwrap(),
            name: id.to_string(),
            district: "01_1".parse().unwrap(),
            party: party.parse().unwrap(),
            status,
            previous_wins: if status == CandidateStatus::Incumbent { 3 } else { 0 },
            dual_candidacy: false,
        }
    }

    fn persona(swing: SwingLevel, affinity: PartyAffinity, turnout: f64) -> Persona {
        Persona {
            id: PersonaId::new(&"01_1".parse::<DistrictId>().unwrap(), 1),
            district: "01_1".parse().unwrap(),
            age: 45,
            gender: Gender::Female,
            occupation: "teacher".into(),
            sector: IndustrySector::Tertiary,
            household: HouseholdType::NuclearFamily,
            income: IncomeBracket::Middle,
            education: EducationLevel::University,
            urbanization: Urbanization::ProvincialCity,
            ideology: Ideology::Centrist,
            engagement: Engagement::Moderate,
            affinity,
            swing,
            turnout_probability: turnout,
            concerns: vec![],
            info_sources: vec![],
        }
    }

    fn ctx<'a>(
        d: &'a District,
        cands: &'a [Candidate],
        table: &'a AlignmentTable,
        params: &'a SimParams,
    ) -> DecisionContext<'a> {
        DecisionContext {
            district: d,
            candidates: cands,
            alignment: table,
            params,
            weather_modifier: 0.0,
        }
    }

    #[test]
    fn certain_turnout_always_votes() {
        let d = district();
        let cands = [candidate("c-a", "alpha", CandidateStatus::Incumbent)];
        let table = AlignmentTable::default();
        let params = SimParams::default();
        let mut rng = SimRng::from_seed_u64(1);
        let out = decide_persona(
            &persona(SwingLevel::VeryLow, PartyAffinity::Undecided, 0.95),
            &ctx(&d, &cands, &table, &params),
            &mut rng,
        );
        // 0.95 is the clamp ceiling; a vanishing fraction of draws abstain.
        if out.decision.will_vote {
            assert_eq!(out.decision.smd_candidate, Some("c-a".parse().unwrap()));
        } else {
            assert!(out.decision.abstention_reason.is_some());
        }
    }

    #[test]
    fn loyal_low_swing_persona_picks_own_party() {
        let d = district();
        let cands = [
            candidate("c-a", "alpha", CandidateStatus::Incumbent),
            candidate("c-b", "beta", CandidateStatus::New),
        ];
        let table = AlignmentTable::default();
        let params = SimParams {
            swing_noise_offset: -1.0, // forces noise to zero
            ..SimParams::default()
        };
        let expected: CandidateId = "c-a".parse().unwrap();
        for seed in 0..20 {
            let mut rng = SimRng::from_seed_u64(seed);
            let out = decide_persona(
                &persona(
                    SwingLevel::VeryLow,
                    PartyAffinity::Party("alpha".parse().unwrap()),
                    0.95,
                ),
                &ctx(&d, &cands, &table, &params),
                &mut rng,
            );
            if out.decision.will_vote {
                assert_eq!(out.decision.smd_candidate.as_ref(), Some(&expected));
            }
        }
    }

    #[test]
    fn moderate_swing_escalates() {
        let d = district();
        let cands = [candidate("c-a", "alpha", CandidateStatus::Incumbent)];
        let table = AlignmentTable::default();
        let params = SimParams::default();
        let mut rng = SimRng::from_seed_u64(5);
        let out = decide_persona(
            &persona(SwingLevel::Moderate, PartyAffinity::Undecided, 0.95),
            &ctx(&d, &cands, &table, &params),
            &mut rng,
        );
        if out.decision.will_vote {
            assert!(out.needs_oracle);
        }
    }

    #[test]
    fn abstainer_never_escalates_and_has_reason() {
        let d = district();
        let cands = [candidate("c-a", "alpha", CandidateStatus::Incumbent)];
        let table = AlignmentTable::default();
        let params = SimParams::default();
        let mut rng = SimRng::from_seed_u64(2);
        let out = decide_persona(
            &persona(SwingLevel::VeryHigh, PartyAffinity::Undecided, 0.05),
            &ctx(&d, &cands, &table, &params),
            &mut rng,
        );
        if !out.decision.will_vote {
            assert!(!out.needs_oracle);
            assert!(out.decision.abstention_reason.is_some());
        }
    }

    #[test]
    fn empty_roster_yields_blank_ballot() {
        let d = district();
        let table = AlignmentTable::default();
        let params = SimParams::default();
        let mut rng = SimRng::from_seed_u64(3);
        let out = decide_persona(
            &persona(SwingLevel::Low, PartyAffinity::Undecided, 0.95),
            &ctx(&d, &[], &table, &params),
            &mut rng,
        );
        if out.decision.will_vote {
            assert!(out.decision.smd_candidate.is_none());
            assert_eq!(out.decision.confidence, 0.0);
            assert!(!out.needs_oracle);
        }
    }

    #[test]
    fn incumbent_outscored_base() {
        let d = district();
        let params = SimParams::default();
        let table = AlignmentTable::default();
        let c = ctx(&d, &[], &table, &params);
        let p = persona(SwingLevel::Low, PartyAffinity::Undecided, 0.9);
        let inc = candidate_score(&p, &candidate("ca", "alpha", CandidateStatus::Incumbent), &c);
        let new = candidate_score(&p, &candidate("cb", "alpha", CandidateStatus::New), &c);
        assert!(inc > new);
    }

    #[test]
    fn confidence_within_bounds() {
        let d = district();
        let cands = [
            candidate("c-a", "alpha", CandidateStatus::Incumbent),
            candidate("c-b", "beta", CandidateStatus::New),
        ];
        let table = AlignmentTable::default();
        let params = SimParams::default();
        for seed in 0..50 {
            let mut rng = SimRng::from_seed_u64(seed);
            let out = decide_persona(
                &persona(SwingLevel::VeryHigh, PartyAffinity::Undecided, 0.95),
                &ctx(&d, &cands, &table, &params),
                &mut rng,
            );
            if out.decision.will_vote {
                assert!((0.1..=1.0).contains(&out.decision.confidence));
            }
        }
    }
}
