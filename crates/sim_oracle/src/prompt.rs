//! Prompt construction for batch adjudication.
//!
//! One request covers one batch: district context, the candidate roster,
//! accumulated memory context, and the batch's personas numbered from 1.
//! The response contract mirrors `protocol::OracleBallot`.

use std::fmt::Write;

use sim_core::entities::{Candidate, CandidateStatus, District, PartyAffinity, Persona};

pub const SYSTEM_PROMPT: &str = "\
You simulate the voting behavior of individual citizens in a mixed-member \
election. For each numbered voter profile, decide whether they vote and, if \
so, which district candidate and which party list they choose. Ground every \
decision in the profile's attributes and the district context. Respond with \
a JSON array only, one object per voter, inside a ```json code fence.";

/// Render the user prompt for one batch.
pub fn build_batch_prompt(
    district: &District,
    candidates: &[Candidate],
    personas: &[Persona],
    memory_context: &str,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# District: {} ({})", district.name, district.id);
    let _ = writeln!(
        out,
        "Historical turnout {:.1}%. Regional issues: {}.",
        district.historical_turnout * 100.0,
        if district.regional_issues.is_empty() {
            "none noted".to_string()
        } else {
            district.regional_issues.join(", ")
        }
    );

    let _ = writeln!(out, "\n## Candidates");
    for c in candidates {
        let status = match c.status {
            CandidateStatus::Incumbent => "incumbent",
            CandidateStatus::Former => "former holder of the seat",
            CandidateStatus::New => "first-time candidate",
        };
        let dual = if c.dual_candidacy {
            ", also on the party list"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "- {} ({}): {status}, {} prior wins{dual}",
            c.name, c.party, c.previous_wins
        );
    }

    let _ = writeln!(out, "\n## Baseline party support");
    for (party, share) in &district.party_support {
        let _ = writeln!(out, "- {party}: {:.1}%", share * 100.0);
    }
    let _ = writeln!(
        out,
        "- undecided: {:.1}%",
        district.floating_ratio * 100.0
    );

    if !memory_context.is_empty() {
        let _ = writeln!(out, "\n{memory_context}");
    }

    let _ = writeln!(out, "\n## Voters");
    for (i, p) in personas.iter().enumerate() {
        let affinity = match &p.affinity {
            PartyAffinity::Party(party) => format!("supports {party}"),
            PartyAffinity::Undecided => "no party affiliation".to_string(),
        };
        let _ = writeln!(
            out,
            "{}. {}-year-old {:?}, {} ({:?} sector), {:?} income, {:?} ideology, \
             {:?} engagement, {affinity}; concerns: {}; gets news from: {}",
            i + 1,
            p.age,
            p.gender,
            p.occupation,
            p.sector,
            p.income,
            p.ideology,
            p.engagement,
            p.concerns.join(", "),
            p.info_sources.join(", "),
        );
    }

    let _ = writeln!(
        out,
        "\n## Response format\n\
         Return a JSON array with exactly {} objects:\n\
         {{\"persona_index\": <1-based number>, \"will_vote\": true|false,\n \
         \"abstention_reason\": \"...\" (only when not voting),\n \
         \"smd_vote\": {{\"candidate\": \"<name>\", \"reason\": \"...\"}},\n \
         \"proportional_vote\": {{\"party\": \"<party id>\", \"reason\": \"...\"}},\n \
         \"confidence\": 0.0-1.0, \"swing_factors\": [\"...\"]}}",
        personas.len()
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::entities::{
        EducationLevel, Engagement, Gender, HouseholdType, Ideology, IncomeBracket,
        IndustrySector, SwingLevel, Urbanization,
    };
    use sim_core::ids::{DistrictId, PersonaId};
    use std::collections::BTreeMap;

    #[test]
    fn prompt_numbers_personas_and_names_candidates() {
        let district = District {
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
            floating_ratio: 0.4,
            regional_issues: vec!["snow removal budgets".into()],
            historical_turnout: 0.57,
        };
        let candidates = vec![Candidate {
            id: "c-yamada".parse().unwrap(),
            name: "Yamada".into(),
            district: "01_1".parse().unwrap(),
            party: "alpha".parse().unwrap(),
            status: CandidateStatus::Incumbent,
            previous_wins: 4,
            dual_candidacy: true,
        }];
        let personas = vec![Persona {
            id: PersonaId::new(&"01_1".parse::<DistrictId>().unwrap(), 1),
            district: "01_1".parse().unwrap(),
            age: 52,
            gender: Gender::Female,
            occupation: "farm owner".into(),
            sector: IndustrySector::Primary,
            household: HouseholdType::Couple,
            income: IncomeBracket::Middle,
            education: EducationLevel::Secondary,
            urbanization: Urbanization::Rural,
            ideology: Ideology::Conservative,
            engagement: Engagement::High,
            affinity: PartyAffinity::Party("alpha".parse().unwrap()),
            swing: SwingLevel::Moderate,
            turnout_probability: 0.8,
            concerns: vec!["pensions".into()],
            info_sources: vec!["newspapers".into()],
        }];

        let prompt = build_batch_prompt(&district, &candidates, &personas, "## Memory\nnone");
        assert!(prompt.contains("North 1st"));
        assert!(prompt.contains("Yamada"));
        assert!(prompt.contains("incumbent"));
        assert!(prompt.contains("1. 52-year-old"));
        assert!(prompt.contains("## Memory"));
        assert!(prompt.contains("exactly 1 objects"));
    }
}
