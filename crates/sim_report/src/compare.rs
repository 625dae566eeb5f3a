//! Pairwise comparison of two outcome sets.
//!
//! Side `a` is the run under evaluation, side `b` the baseline (another
//! run, or ingested actual results). Districts are joined by id; rows
//! present on only one side are excluded from every metric.

use std::collections::BTreeMap;

use serde::Serialize;

use sim_core::ids::{DistrictId, PartyId};
use sim_io::experiment::OutcomeRow;

/// Districts needed before rank- and variance-dependent metrics apply.
const CORRELATION_FLOOR: usize = 3;
const BATTLEGROUND_FLOOR: usize = 4;

/// Per-party district-seat count on each side.
#[derive(Clone, Debug, Serialize)]
pub struct SeatDiff {
    pub party: PartyId,
    pub seats_a: u32,
    pub seats_b: u32,
    /// `seats_a - seats_b`.
    pub diff: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ComparisonReport {
    /// Districts present on both sides.
    pub districts_compared: u32,
    pub winner_matches: u32,
    /// Fraction of compared districts where both sides elect the same party.
    pub winner_match_rate: f64,
    pub turnout_mae: f64,
    /// Pearson correlation of turnout rate across common districts. `None`
    /// below 3 common districts or when either series has no variance.
    pub turnout_correlation: Option<f64>,
    pub seat_diffs: Vec<SeatDiff>,
    /// Mean absolute per-party seat difference.
    pub seat_mae: f64,
    /// The lowest-margin quartile of the common districts, by side `b`'s
    /// margins (the reference side). `None` below 4 common districts.
    pub battlegrounds: Option<Vec<DistrictId>>,
    /// Winner match rate restricted to the battleground districts.
    pub battleground_accuracy: Option<f64>,
}

/// Compare two outcome sets district by district.
pub fn compare_outcomes(a: &[OutcomeRow], b: &[OutcomeRow]) -> ComparisonReport {
    let b_by_id: BTreeMap<&DistrictId, &OutcomeRow> =
        b.iter().map(|row| (&row.district, row)).collect();
    let common: Vec<(&OutcomeRow, &OutcomeRow)> = a
        .iter()
        .filter_map(|row_a| b_by_id.get(&row_a.district).map(|row_b| (row_a, *row_b)))
        .collect();

    let compared = common.len() as u32;
    let winner_matches = common.iter().filter(|(x, y)| winners_agree(x, y)).count() as u32;
    let turnout_mae = if common.is_empty() {
        0.0
    } else {
        common
            .iter()
            .map(|(x, y)| (x.turnout_rate - y.turnout_rate).abs())
            .sum::<f64>()
            / common.len() as f64
    };
    let turnout_pairs: Vec<(f64, f64)> = common
        .iter()
        .map(|(x, y)| (x.turnout_rate, y.turnout_rate))
        .collect();

    let seat_diffs = seat_diffs(a, b);
    let seat_mae = if seat_diffs.is_empty() {
        0.0
    } else {
        seat_diffs
            .iter()
            .map(|d| d.diff.unsigned_abs() as f64)
            .sum::<f64>()
            / seat_diffs.len() as f64
    };

    let (battlegrounds, battleground_accuracy) = battleground_metrics(&common);

    ComparisonReport {
        districts_compared: compared,
        winner_matches,
        winner_match_rate: if compared > 0 {
            f64::from(winner_matches) / f64::from(compared)
        } else {
            0.0
        },
        turnout_mae,
        turnout_correlation: pearson(&turnout_pairs),
        seat_diffs,
        seat_mae,
        battlegrounds,
        battleground_accuracy,
    }
}

fn winners_agree(x: &OutcomeRow, y: &OutcomeRow) -> bool {
    x.winner_party.is_some() && x.winner_party == y.winner_party
}

fn seat_diffs(a: &[OutcomeRow], b: &[OutcomeRow]) -> Vec<SeatDiff> {
    let mut seats_a: BTreeMap<PartyId, u32> = BTreeMap::new();
    let mut seats_b: BTreeMap<PartyId, u32> = BTreeMap::new();
    for row in a {
        if let Some(party) = &row.winner_party {
            *seats_a.entry(party.clone()).or_insert(0) += 1;
        }
    }
    for row in b {
        if let Some(party) = &row.winner_party {
            *seats_b.entry(party.clone()).or_insert(0) += 1;
        }
    }
    let mut parties: Vec<PartyId> = seats_a.keys().chain(seats_b.keys()).cloned().collect();
    parties.sort();
    parties.dedup();
    parties
        .into_iter()
        .map(|party| {
            let sa = seats_a.get(&party).copied().unwrap_or(0);
            let sb = seats_b.get(&party).copied().unwrap_or(0);
            SeatDiff {
                party,
                seats_a: sa,
                seats_b: sb,
                diff: i64::from(sa) - i64::from(sb),
            }
        })
        .collect()
}

/// Sample Pearson correlation; `None` below the floor or at zero variance.
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < CORRELATION_FLOOR {
        return None;
    }
    let nf = n as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / nf;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for &(x, y) in pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Lowest-margin quartile of the common districts (reference-side margins,
/// at least one district) and the winner match rate within it.
fn battleground_metrics(
    common: &[(&OutcomeRow, &OutcomeRow)],
) -> (Option<Vec<DistrictId>>, Option<f64>) {
    if common.len() < BATTLEGROUND_FLOOR {
        return (None, None);
    }
    let mut ranked: Vec<&(&OutcomeRow, &OutcomeRow)> = common.iter().collect();
    ranked.sort_by(|x, y| {
        x.1.margin
            .cmp(&y.1.margin)
            .then_with(|| x.1.district.cmp(&y.1.district))
    });
    let take = (ranked.len() / 4).max(1);
    let tight = &ranked[..take];
    let matches = tight.iter().filter(|(x, y)| winners_agree(x, y)).count();
    let districts = tight.iter().map(|(_, y)| y.district.clone()).collect();
    (Some(districts), Some(matches as f64 / take as f64))
}
