//! Multi-seed consensus over repeated runs.
//!
//! Several runs with different seeds vote on each district; the agreement
//! rate behind the plurality winner rates the seat as safe, likely, or a
//! battleground.

use std::collections::BTreeMap;

use serde::Serialize;

use sim_core::ids::{DistrictId, PartyId};
use sim_io::experiment::OutcomeRow;

/// Agreement floor separating `Likely` from `Battleground`.
const LIKELY_FLOOR: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatRating {
    /// Every run agrees.
    Safe,
    /// Agreement at or above the floor.
    Likely,
    Battleground,
}

impl SeatRating {
    fn from_agreement(agreement: f64) -> Self {
        if agreement >= 1.0 {
            SeatRating::Safe
        } else if agreement >= LIKELY_FLOOR {
            SeatRating::Likely
        } else {
            SeatRating::Battleground
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ConsensusEntry {
    pub district: DistrictId,
    pub district_name: String,
    /// Runs that produced a result for this district.
    pub runs: u32,
    /// Plurality winner across runs; ties break to the smaller party id.
    pub winner_party: Option<PartyId>,
    /// Fraction of runs electing the plurality winner.
    pub agreement: f64,
    pub rating: SeatRating,
    pub turnout_mean: f64,
    /// Sample standard deviation of turnout; 0 for a single run.
    pub turnout_stddev: f64,
    /// Mean proportional vote share per party, absent parties counted as 0.
    pub share_means: BTreeMap<PartyId, f64>,
}

/// Fold any number of runs into one entry per district, id order.
pub fn build_consensus(runs: &[Vec<OutcomeRow>]) -> Vec<ConsensusEntry> {
    let mut by_district: BTreeMap<DistrictId, Vec<&OutcomeRow>> = BTreeMap::new();
    for run in runs {
        for row in run {
            by_district.entry(row.district.clone()).or_default().push(row);
        }
    }

    by_district
        .into_iter()
        .map(|(district, rows)| consensus_entry(district, &rows))
        .collect()
}

fn consensus_entry(district: DistrictId, rows: &[&OutcomeRow]) -> ConsensusEntry {
    let n = rows.len() as u32;

    let mut winner_counts: BTreeMap<&PartyId, u32> = BTreeMap::new();
    for row in rows {
        if let Some(party) = &row.winner_party {
            *winner_counts.entry(party).or_insert(0) += 1;
        }
    }
    // max_by favors later entries on ties; reversed id order makes the
    // smaller party id win.
    let plurality = winner_counts
        .iter()
        .rev()
        .max_by_key(|(_, &count)| count)
        .map(|(&party, &count)| (party.clone(), count));
    let (winner_party, agreement) = match plurality {
        Some((party, count)) => (Some(party), f64::from(count) / f64::from(n)),
        None => (None, 0.0),
    };

    let turnouts: Vec<f64> = rows.iter().map(|r| r.turnout_rate).collect();
    let turnout_mean = turnouts.iter().sum::<f64>() / turnouts.len() as f64;
    let turnout_stddev = if turnouts.len() > 1 {
        let var = turnouts
            .iter()
            .map(|t| (t - turnout_mean).powi(2))
            .sum::<f64>()
            / (turnouts.len() - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };

    // Shares averaged over all runs; a run where the party drew no votes
    // contributes zero.
    let mut share_sums: BTreeMap<PartyId, f64> = BTreeMap::new();
    for row in rows {
        let total: u64 = row.proportional_votes.values().map(|&v| u64::from(v)).sum();
        if total == 0 {
            continue;
        }
        for (party, &votes) in &row.proportional_votes {
            *share_sums.entry(party.clone()).or_insert(0.0) +=
                f64::from(votes) / total as f64;
        }
    }
    let share_means = share_sums
        .into_iter()
        .map(|(party, sum)| (party, sum / f64::from(n)))
        .collect();

    ConsensusEntry {
        district_name: rows[0].district_name.clone(),
        district,
        runs: n,
        winner_party,
        agreement,
        rating: SeatRating::from_agreement(agreement),
        turnout_mean,
        turnout_stddev,
        share_means,
    }
}

/* --------------------------- seat spread over seeds --------------------------- */

/// Mean / sample-stddev / min / max of one seat series across seeds.
#[derive(Clone, Debug, Serialize)]
pub struct SeatSpread {
    pub mean: f64,
    pub stddev: f64,
    pub min: u32,
    pub max: u32,
}

impl SeatSpread {
    fn of(counts: &[u32]) -> Self {
        let n = counts.len() as f64;
        let mean = counts.iter().map(|&c| f64::from(c)).sum::<f64>() / n;
        let stddev = if counts.len() > 1 {
            (counts
                .iter()
                .map(|&c| (f64::from(c) - mean).powi(2))
                .sum::<f64>()
                / (counts.len() - 1) as f64)
                .sqrt()
        } else {
            0.0
        };
        Self {
            mean,
            stddev,
            min: counts.iter().copied().min().unwrap_or(0),
            max: counts.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Per-party spread of district and list seats across seeds.
#[derive(Clone, Debug, Serialize)]
pub struct PartySeatStats {
    pub party: PartyId,
    pub smd: SeatSpread,
    pub pr: SeatSpread,
}

/// Seat statistics across run summaries, zero-padding parties that won no
/// seats in some seeds. Party-id order.
pub fn seat_spread(summaries: &[&sim_core::entities::RunSummary]) -> Vec<PartySeatStats> {
    let mut parties: Vec<PartyId> = summaries
        .iter()
        .flat_map(|s| s.smd_seats.keys().chain(s.pr_seats_total.keys()))
        .cloned()
        .collect();
    parties.sort();
    parties.dedup();

    parties
        .into_iter()
        .map(|party| {
            let smd: Vec<u32> = summaries
                .iter()
                .map(|s| s.smd_seats.get(&party).copied().unwrap_or(0))
                .collect();
            let pr: Vec<u32> = summaries
                .iter()
                .map(|s| s.pr_seats_total.get(&party).copied().unwrap_or(0))
                .collect();
            PartySeatStats {
                party,
                smd: SeatSpread::of(&smd),
                pr: SeatSpread::of(&pr),
            }
        })
        .collect()
}
