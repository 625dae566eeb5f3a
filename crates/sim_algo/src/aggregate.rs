//! District-level tallying of persona decisions.
//!
//! Pure function over (personas, decisions, candidates). District-seat votes
//! count only decisions that voted and name a candidate; when the oracle only
//! produced party labels, a synthetic tally is reconstructed by mapping each
//! party to its first matching candidate in roster order. Winner/runner-up
//! ties break by votes descending then candidate id ascending.

use std::collections::BTreeMap;

use sim_core::entities::{Candidate, CohortStats, District, DistrictResult, Persona, VoteDecision};
use sim_core::ids::CandidateId;

pub fn aggregate_district(
    district: &District,
    personas: &[Persona],
    decisions: &[VoteDecision],
    candidates: &[Candidate],
) -> DistrictResult {
    // Turnout is a share of the sampled roster, not of the decision list.
    let total = personas.len() as u32;
    let turnout_count = decisions.iter().filter(|d| d.will_vote).count() as u32;
    let turnout_rate = if total > 0 {
        ((turnout_count as f64 / total as f64) * 10_000.0).round() / 10_000.0
    } else {
        0.0
    };

    /* ---- district-seat tally ---- */

    let mut smd_votes: BTreeMap<CandidateId, u32> = BTreeMap::new();
    for d in decisions.iter().filter(|d| d.will_vote) {
        if let Some(c) = &d.smd_candidate {
            *smd_votes.entry(c.clone()).or_insert(0) += 1;
        }
    }

    // Degenerate fallback: party labels only, no candidate names.
    if smd_votes.is_empty() {
        for d in decisions.iter().filter(|d| d.will_vote) {
            if let Some(party) = &d.smd_party {
                if let Some(c) = candidates.iter().find(|c| &c.party == party) {
                    *smd_votes.entry(c.id.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    // Votes descending, candidate id ascending as tie-break.
    let mut ranked: Vec<(&CandidateId, u32)> =
        smd_votes.iter().map(|(c, &v)| (c, v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let party_of = |id: &CandidateId| {
        candidates
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.party.clone())
    };

    let (winner, winner_party, winner_votes) = match ranked.first() {
        Some((id, votes)) => ((Some((*id).clone())), party_of(id), *votes),
        None => (None, None, 0),
    };
    let (runner_up, runner_up_party, runner_up_votes) = match ranked.get(1) {
        Some((id, votes)) => ((Some((*id).clone())), party_of(id), *votes),
        None => (None, None, 0),
    };
    let margin = winner_votes.saturating_sub(runner_up_votes);

    /* ---- list-ballot tally ---- */

    let mut proportional_votes = BTreeMap::new();
    for d in decisions.iter().filter(|d| d.will_vote) {
        if let Some(p) = &d.proportional_party {
            *proportional_votes.entry(p.clone()).or_insert(0) += 1;
        }
    }

    /* ---- cohort breakdown (by industry sector) ---- */

    let mut cohorts: BTreeMap<String, CohortStats> = BTreeMap::new();
    for (persona, decision) in personas.iter().zip(decisions) {
        let stats = cohorts
            .entry(persona.sector.as_str().to_string())
            .or_default();
        stats.count += 1;
        if decision.will_vote {
            stats.voted += 1;
            if let Some(p) = &decision.smd_party {
                *stats.smd_parties.entry(p.clone()).or_insert(0) += 1;
            }
            if let Some(p) = &decision.proportional_party {
                *stats.proportional_parties.entry(p.clone()).or_insert(0) += 1;
            }
        }
    }

    let abstention_reasons = decisions
        .iter()
        .filter(|d| !d.will_vote)
        .filter_map(|d| d.abstention_reason.clone())
        .collect();

    DistrictResult {
        district: district.id.clone(),
        district_name: district.name.clone(),
        total_personas: total,
        turnout_count,
        turnout_rate,
        winner,
        winner_party,
        winner_votes,
        runner_up,
        runner_up_party,
        runner_up_votes,
        margin,
        smd_votes,
        proportional_votes,
        cohorts,
        abstention_reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::entities::{
        CandidateStatus, DecisionMethod, EducationLevel, Engagement, Gender, HouseholdType,
        Ideology, IncomeBracket, IndustrySector, PartyAffinity, SwingLevel, Urbanization,
    };
    use sim_core::ids::{DistrictId, PersonaId};

    fn district() -> District {
        District {
            id: "01_1".parse().unwrap(),
            name: "North 1st".into(),
            block: "north".parse().unwrap(),
            age_bands: [0.15; 6],
            male_ratio: 0.48,
            industry: [0.1, 0.2, 0.7],
            households: [0.2; 5],
            income_level: IncomeBracket::Middle,
            university_rate: 0.3,
            urbanization: Urbanization::ProvincialCity,
            party_support: BTreeMap::new(),
            floating_ratio: 0.3,
            regional_issues: vec![],
            historical_turnout: 0.55,
        }
    }

    fn candidate(id: &str, party: &str) -> Candidate {
        Candidate {
            id: id.parse().unwrap(),
            name: id.to_string(),
            district: "01_1".parse().unwrap(),
            party: party.parse().unwrap(),
            status: CandidateStatus::New,
            previous_wins: 0,
            dual_candidacy: false,
        }
    }

    fn persona(i: u32, sector: IndustrySector) -> Persona {
        Persona {
            id: PersonaId::new(&"01_1".parse::<DistrictId>().unwrap(), i),
            district: "01_1".parse().unwrap(),
            age: 40,
            gender: Gender::Male,
            occupation: "clerk".into(),
            sector,
            household: HouseholdType::Single,
            income: IncomeBracket::Middle,
            education: EducationLevel::Secondary,
            urbanization: Urbanization::ProvincialCity,
            ideology: Ideology::Centrist,
            engagement: Engagement::Moderate,
            affinity: PartyAffinity::Undecided,
            swing: SwingLevel::Low,
            turnout_probability: 0.5,
            concerns: vec![],
            info_sources: vec![],
        }
    }

    fn vote(i: u32, candidate: Option<&str>, party: &str) -> VoteDecision {
        VoteDecision::ballot(
            PersonaId::new(&"01_1".parse::<DistrictId>().unwrap(), i),
            SwingLevel::Low,
            DecisionMethod::Rule,
            candidate.map(|c| c.parse().unwrap()),
            Some(party.parse().unwrap()),
            Some(party.parse().unwrap()),
            0.5,
        )
    }

    fn abstain(i: u32) -> VoteDecision {
        VoteDecision::abstain(
            PersonaId::new(&"01_1".parse::<DistrictId>().unwrap(), i),
            SwingLevel::Low,
            "feeling unwell".into(),
        )
    }

    #[test]
    fn basic_winner_and_margin() {
        let d = district();
        let cands = [candidate("c-a", "alpha"), candidate("c-b", "beta")];
        let personas: Vec<_> = (1..=5).map(|i| persona(i, IndustrySector::Tertiary)).collect();
        let decisions = vec![
            vote(1, Some("c-a"), "alpha"),
            vote(2, Some("c-a"), "alpha"),
            vote(3, Some("c-a"), "alpha"),
            vote(4, Some("c-b"), "beta"),
            abstain(5),
        ];
        let r = aggregate_district(&d, &personas, &decisions, &cands);
        assert_eq!(r.total_personas, 5);
        assert_eq!(r.turnout_count, 4);
        assert!((r.turnout_rate - 0.8).abs() < 1e-12);
        assert_eq!(r.winner, Some("c-a".parse().unwrap()));
        assert_eq!(r.winner_party, Some("alpha".parse().unwrap()));
        assert_eq!(r.winner_votes, 3);
        assert_eq!(r.runner_up_votes, 1);
        assert_eq!(r.margin, 2);
        assert_eq!(r.abstention_reasons, vec!["feeling unwell".to_string()]);
    }

    #[test]
    fn turnout_denominator_is_the_persona_roster() {
        let d = district();
        let cands = [candidate("c-a", "alpha")];
        let personas: Vec<_> = (1..=4).map(|i| persona(i, IndustrySector::Tertiary)).collect();
        // One persona never produced a decision; it still counts as sampled.
        let decisions = vec![
            vote(1, Some("c-a"), "alpha"),
            vote(2, Some("c-a"), "alpha"),
            abstain(3),
        ];
        let r = aggregate_district(&d, &personas, &decisions, &cands);
        assert_eq!(r.total_personas, 4);
        assert_eq!(r.turnout_count, 2);
        assert!((r.turnout_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tie_breaks_by_candidate_id() {
        let d = district();
        let cands = [candidate("c-b", "beta"), candidate("c-a", "alpha")];
        let personas: Vec<_> = (1..=2).map(|i| persona(i, IndustrySector::Tertiary)).collect();
        let decisions = vec![vote(1, Some("c-b"), "beta"), vote(2, Some("c-a"), "alpha")];
        let r = aggregate_district(&d, &personas, &decisions, &cands);
        assert_eq!(r.winner, Some("c-a".parse().unwrap()));
        assert_eq!(r.margin, 0);
    }

    #[test]
    fn party_only_ballots_reconstructed() {
        let d = district();
        let cands = [candidate("c-a", "alpha"), candidate("c-a2", "alpha")];
        let personas: Vec<_> = (1..=3).map(|i| persona(i, IndustrySector::Primary)).collect();
        let decisions = vec![
            vote(1, None, "alpha"),
            vote(2, None, "alpha"),
            vote(3, None, "alpha"),
        ];
        let r = aggregate_district(&d, &personas, &decisions, &cands);
        // First matching candidate in roster order absorbs the party votes.
        assert_eq!(r.winner, Some("c-a".parse().unwrap()));
        assert_eq!(r.winner_votes, 3);
    }

    #[test]
    fn cohorts_track_both_ballots() {
        let d = district();
        let cands = [candidate("c-a", "alpha")];
        let personas = vec![
            persona(1, IndustrySector::Primary),
            persona(2, IndustrySector::Primary),
            persona(3, IndustrySector::Tertiary),
        ];
        let decisions = vec![
            vote(1, Some("c-a"), "alpha"),
            abstain(2),
            vote(3, Some("c-a"), "alpha"),
        ];
        let r = aggregate_district(&d, &personas, &decisions, &cands);
        let primary = &r.cohorts["primary"];
        assert_eq!(primary.count, 2);
        assert_eq!(primary.voted, 1);
        assert_eq!(primary.smd_parties[&"alpha".parse::<sim_core::ids::PartyId>().unwrap()], 1);
        assert_eq!(r.cohorts["tertiary"].voted, 1);
    }

    #[test]
    fn empty_decisions_produce_empty_result() {
        let d = district();
        let r = aggregate_district(&d, &[], &[], &[]);
        assert_eq!(r.total_personas, 0);
        assert_eq!(r.turnout_rate, 0.0);
        assert!(r.winner.is_none());
        assert!(r.smd_votes.is_empty());
    }
}
