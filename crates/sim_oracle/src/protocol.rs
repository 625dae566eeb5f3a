//! Structured decision protocol: what the oracle returns and how it becomes
//! `VoteDecision`s.
//!
//! The oracle answers with a JSON array, one object per persona, optionally
//! wrapped in a Markdown code fence. Tolerances required here: decisions may
//! arrive out of order (1-based `persona_index` keys them), indices outside
//! the batch are discarded, and optional fields default.

use serde::Deserialize;

use sim_core::entities::{Candidate, DecisionMethod, Persona, VoteDecision};

use crate::OracleError;

/// One raw decision object from the oracle.
#[derive(Debug, Deserialize)]
pub struct OracleBallot {
    /// 1-based position of the persona within the batch.
    #[serde(default)]
    pub persona_index: i64,
    #[serde(default = "default_true")]
    pub will_vote: bool,
    #[serde(default)]
    pub abstention_reason: Option<String>,
    #[serde(default)]
    pub smd_vote: Option<BallotChoice>,
    #[serde(default)]
    pub proportional_vote: Option<BallotChoice>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub swing_factors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BallotChoice {
    #[serde(default)]
    pub candidate: Option<String>,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_confidence() -> f64 {
    0.5
}

/// Extract the JSON array from oracle output: prefer a ```json fence, fall
/// back to the outermost bracket pair.
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
    }
    let trimmed = text.trim();
    match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parse oracle output into `(batch_slot, decision)` pairs.
///
/// `personas` is the batch in dispatch order; the returned slot is the
/// 0-based index into it. Ballots referencing personas outside the batch are
/// dropped. Party resolution prefers the named candidate's party; a bare
/// party label is accepted when it matches the roster. A missing list-ballot
/// party follows the district-seat party.
pub fn parse_response(
    text: &str,
    personas: &[Persona],
    candidates: &[Candidate],
) -> Result<Vec<(usize, VoteDecision)>, OracleError> {
    let json = extract_json(text);
    let ballots: Vec<OracleBallot> =
        serde_json::from_str(json).map_err(|e| OracleError::Parse(e.to_string()))?;

    let mut out = Vec::with_capacity(ballots.len());
    for ballot in ballots {
        let slot = ballot.persona_index - 1;
        if slot < 0 || slot as usize >= personas.len() {
            continue;
        }
        let slot = slot as usize;
        let persona = &personas[slot];

        if !ballot.will_vote {
            let reason = ballot
                .abstention_reason
                .unwrap_or_else(|| "abstained on oracle judgment".to_string());
            out.push((
                slot,
                VoteDecision::abstain(persona.id.clone(), persona.swing, reason),
            ));
            continue;
        }

        let smd = ballot.smd_vote.unwrap_or_default();
        let prop = ballot.proportional_vote.unwrap_or_default();

        // Candidate name wins; otherwise accept a party label found on the roster.
        let smd_candidate = smd
            .candidate
            .as_deref()
            .and_then(|name| candidates.iter().find(|c| c.name == name || c.id.as_str() == name));
        let smd_party = smd_candidate
            .map(|c| c.party.clone())
            .or_else(|| {
                smd.party
                    .as_deref()
                    .and_then(|p| candidates.iter().find(|c| c.party.as_str() == p))
                    .map(|c| c.party.clone())
            });

        let proportional_party = prop
            .party
            .as_deref()
            .and_then(|p| p.parse().ok())
            .or_else(|| smd_party.clone());

        let mut decision = VoteDecision::ballot(
            persona.id.clone(),
            persona.swing,
            DecisionMethod::Oracle,
            smd_candidate.map(|c| c.id.clone()),
            smd_party,
            proportional_party,
            ballot.confidence,
        );
        decision.smd_reason = smd.reason;
        decision.proportional_reason = prop.reason;
        decision.swing_factors = ballot.swing_factors;
        out.push((slot, decision));
    }
    Ok(out)
}
