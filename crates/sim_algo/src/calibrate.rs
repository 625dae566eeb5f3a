//! Post-hoc distribution calibration.
//!
//! Softly nudges the realized district-seat party distribution toward the
//! district's baseline support distribution. A best-effort nudge, not an
//! exact solve; flip probabilities scale with the remaining gap, so the
//! pass is stable under repetition.

use std::collections::BTreeMap;

use tracing::debug;

use sim_core::entities::{CalibrationSignal, DecisionMethod, District, VoteDecision};
use sim_core::ids::PartyId;
use sim_core::rng::SimRng;

/// Normalized target distribution from the district's baseline support.
/// Zero and negative entries are dropped.
fn target_distribution(district: &District) -> BTreeMap<PartyId, f64> {
    let mut target: BTreeMap<PartyId, f64> = district
        .party_support
        .iter()
        .filter(|(_, &v)| v > 0.0)
        .map(|(p, &v)| (p.clone(), v))
        .collect();
    let total: f64 = target.values().sum();
    if total > 0.0 {
        for v in target.values_mut() {
            *v /= total;
        }
    }
    target
}

/// Realized district-seat share per party among deciding voters.
fn realized_distribution(decisions: &[VoteDecision]) -> (BTreeMap<PartyId, f64>, usize) {
    let mut counts: BTreeMap<PartyId, u32> = BTreeMap::new();
    let mut voted = 0usize;
    for d in decisions {
        if d.will_vote {
            if let Some(party) = &d.smd_party {
                *counts.entry(party.clone()).or_insert(0) += 1;
                voted += 1;
            }
        }
    }
    let dist = counts
        .into_iter()
        .map(|(p, c)| (p, c as f64 / voted.max(1) as f64))
        .collect();
    (dist, voted)
}

/// Flip over-represented ballots toward under-represented parties in place.
///
/// Each voter of a party more than 1% over target flips with probability
/// `over_representation * strength`; the flipped ballot keeps its candidate
/// and rationale fields, takes a reduced confidence, and is retagged
/// `Calibrated`. `strength` 0 makes this a no-op.
pub fn calibrate_decisions(
    decisions: &mut [VoteDecision],
    district: &District,
    strength: f64,
    rng: &mut SimRng,
) {
    if !(strength > 0.0) {
        return;
    }
    let target = target_distribution(district);
    if target.is_empty() {
        return;
    }
    let (realized, voted) = realized_distribution(decisions);
    if voted == 0 {
        return;
    }

    let mut over: BTreeMap<PartyId, f64> = BTreeMap::new();
    let mut under: Vec<(PartyId, f64)> = Vec::new();
    for party in realized.keys().chain(target.keys()) {
        if over.contains_key(party) || under.iter().any(|(p, _)| p == party) {
            continue;
        }
        let diff = realized.get(party).copied().unwrap_or(0.0)
            - target.get(party).copied().unwrap_or(0.0);
        if diff > 0.01 {
            over.insert(party.clone(), diff * strength);
        } else if diff < -0.01 {
            under.push((party.clone(), diff.abs() * strength));
        }
    }
    if over.is_empty() || under.is_empty() {
        return;
    }

    let under_weights: Vec<f64> = under.iter().map(|(_, w)| *w).collect();
    let mut flipped = 0u32;
    for d in decisions.iter_mut() {
        if !d.will_vote {
            continue;
        }
        let Some(party) = d.smd_party.clone() else { continue };
        let Some(&flip_prob) = over.get(&party) else { continue };
        if rng.next_f64() < flip_prob {
            let Some(ix) = rng.weighted_choice(&under_weights) else { continue };
            d.smd_party = Some(under[ix].0.clone());
            d.confidence = (d.confidence * 0.8).clamp(0.0, 1.0);
            d.method = DecisionMethod::Calibrated;
            flipped += 1;
        }
    }
    debug!(district = %district.id, flipped, voted, "calibration pass");
}

/// Signed `target - predicted` gap per party, computed without mutating
/// anything; feeds the longitudinal memory store.
pub fn compute_calibration_signals(
    decisions: &[VoteDecision],
    district: &District,
) -> Vec<CalibrationSignal> {
    let target = target_distribution(district);
    if target.is_empty() {
        return Vec::new();
    }
    let (realized, voted) = realized_distribution(decisions);
    if voted == 0 {
        return Vec::new();
    }
    target
        .iter()
        .map(|(party, &t)| {
            let predicted = realized.get(party).copied().unwrap_or(0.0);
            CalibrationSignal {
                district: district.id.clone(),
                party: party.clone(),
                target_share: t,
                predicted_share: predicted,
                correction: t - predicted,
            }
        })
        .collect()
}
