//! Plain-text renderings for the CLI.

use std::fmt::Write;

use sim_io::experiment::{ExperimentRecord, RunStatus};

use crate::compare::ComparisonReport;
use crate::consensus::{ConsensusEntry, PartySeatStats, SeatRating};

/// Full single-run report: identity, seats, and validation.
pub fn render_record(record: &ExperimentRecord) -> String {
    let mut out = String::new();
    let summary = &record.summary;

    let status = match record.status {
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
    };
    let _ = writeln!(out, "experiment {}", record.id);
    let _ = writeln!(
        out,
        "  {status} in {:.1}s, {} districts ({} failed)",
        record.duration_secs,
        summary.districts_simulated,
        summary.failed_districts.len()
    );
    if !record.description.is_empty() {
        let _ = writeln!(out, "  {}", record.description);
    }
    if !record.tags.is_empty() {
        let _ = writeln!(out, "  tags: {}", record.tags.join(", "));
    }
    let _ = writeln!(
        out,
        "  national turnout {:.1}%",
        summary.national_turnout * 100.0
    );

    let _ = writeln!(out, "\n  seats (district + proportional = total):");
    for (party, &total) in &summary.total_seats {
        let smd = summary.smd_seats.get(party).copied().unwrap_or(0);
        let pr = summary.pr_seats_total.get(party).copied().unwrap_or(0);
        let _ = writeln!(out, "    {party:<24} {smd:>4} + {pr:>4} = {total:>4}");
    }
    match &summary.majority_party {
        Some(party) => {
            let _ = writeln!(
                out,
                "  majority: {party} (threshold {})",
                summary.majority_threshold
            );
        }
        None => {
            let _ = writeln!(
                out,
                "  majority: none reaches {}",
                summary.majority_threshold
            );
        }
    }

    let _ = writeln!(
        out,
        "\n  validation: {} ({} checks, {} warnings, {} errors)",
        if record.validation.passed { "passed" } else { "FAILED" },
        record.validation.checks.len(),
        record.validation.warnings.len(),
        record.validation.errors.len()
    );
    for warning in &record.validation.warnings {
        let _ = writeln!(out, "    warn: {warning}");
    }
    for error in &record.validation.errors {
        let _ = writeln!(out, "    error: {error}");
    }
    out
}

/// One line per run, for listings.
pub fn render_record_line(record: &ExperimentRecord) -> String {
    let marker = match record.status {
        RunStatus::Completed => ' ',
        RunStatus::Failed => '!',
    };
    format!(
        "{marker} {}  turnout {:>5.1}%  districts {:>3}  {}",
        record.id,
        record.summary.national_turnout * 100.0,
        record.summary.districts_simulated,
        record.description
    )
}

pub fn render_comparison(label_a: &str, label_b: &str, report: &ComparisonReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "comparison: {label_a} vs {label_b}");
    let _ = writeln!(
        out,
        "  districts compared  {}",
        report.districts_compared
    );
    let _ = writeln!(
        out,
        "  winner match        {}/{} ({:.1}%)",
        report.winner_matches,
        report.districts_compared,
        report.winner_match_rate * 100.0
    );
    let _ = writeln!(out, "  turnout MAE         {:.4}", report.turnout_mae);
    let _ = writeln!(out, "  seat MAE            {:.2}", report.seat_mae);
    match report.turnout_correlation {
        Some(r) => {
            let _ = writeln!(out, "  turnout correlation {r:.4}");
        }
        None => {
            let _ = writeln!(out, "  turnout correlation n/a");
        }
    }
    match report.battleground_accuracy {
        Some(acc) => {
            let _ = writeln!(out, "  battleground match  {:.1}%", acc * 100.0);
        }
        None => {
            let _ = writeln!(out, "  battleground match  n/a");
        }
    }

    if !report.seat_diffs.is_empty() {
        let _ = writeln!(out, "\n  district seats ({label_a} / {label_b} / diff):");
        for d in &report.seat_diffs {
            let _ = writeln!(
                out,
                "    {:<24} {:>4} / {:>4} / {:+}",
                d.party, d.seats_a, d.seats_b, d.diff
            );
        }
    }
    if let Some(battlegrounds) = &report.battlegrounds {
        let names: Vec<String> = battlegrounds.iter().map(|d| d.to_string()).collect();
        let _ = writeln!(out, "\n  battlegrounds: {}", names.join(", "));
    }
    out
}

pub fn render_consensus(entries: &[ConsensusEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<24} {:<14} {:>6}  {:>14}",
        "district", "winner", "rating", "agree", "turnout"
    );
    for e in entries {
        let winner = e
            .winner_party
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let rating = match e.rating {
            SeatRating::Safe => "safe",
            SeatRating::Likely => "likely",
            SeatRating::Battleground => "battleground",
        };
        let _ = writeln!(
            out,
            "{:<10} {winner:<24} {rating:<14} {:>5.0}%  {:.3} +/- {:.3}",
            e.district.to_string(),
            e.agreement * 100.0,
            e.turnout_mean,
            e.turnout_stddev
        );
    }
    let battlegrounds = entries
        .iter()
        .filter(|e| e.rating == SeatRating::Battleground)
        .count();
    let _ = writeln!(
        out,
        "\n{} districts, {battlegrounds} battlegrounds",
        entries.len()
    );
    out
}

/// Voter rationales grouped by supported party; capped per party so large
/// runs stay readable.
pub fn render_opinions(
    opinions: &std::collections::BTreeMap<sim_core::ids::PartyId, Vec<String>>,
    per_party: usize,
) -> String {
    let mut out = String::new();
    for (party, reasons) in opinions {
        let _ = writeln!(out, "\n{party} ({} rationales):", reasons.len());
        for reason in reasons.iter().take(per_party) {
            let _ = writeln!(out, "  - {reason}");
        }
        if reasons.len() > per_party {
            let _ = writeln!(out, "  ... {} more", reasons.len() - per_party);
        }
    }
    out
}

pub fn render_seat_spread(stats: &[PartySeatStats]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{:<24} {:>18} {:>18}",
        "party", "district seats", "list seats"
    );
    for s in stats {
        let _ = writeln!(
            out,
            "{:<24} {:>6.1} +/- {:<4.1} [{}-{}]  {:>4.1} +/- {:<4.1} [{}-{}]",
            s.party.to_string(),
            s.smd.mean,
            s.smd.stddev,
            s.smd.min,
            s.smd.max,
            s.pr.mean,
            s.pr.stddev,
            s.pr.min,
            s.pr.max
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare_outcomes;
    use crate::consensus::build_consensus;
    use sim_io::experiment::OutcomeRow;

    fn row(id: &str, party: &str) -> OutcomeRow {
        OutcomeRow {
            district: id.parse().unwrap(),
            district_name: id.to_string(),
            total_personas: 100,
            turnout_rate: 0.6,
            winner: Some("c-w".parse().unwrap()),
            winner_party: Some(party.parse().unwrap()),
            winner_votes: 50,
            runner_up_votes: 40,
            margin: 10,
            proportional_votes: [("alpha".parse().unwrap(), 55), ("beta".parse().unwrap(), 45)]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn comparison_rendering_names_both_sides() {
        let rows = vec![row("01_1", "alpha"), row("01_2", "beta")];
        let report = compare_outcomes(&rows, &rows);
        let text = render_comparison("sim", "actual", &report);
        assert!(text.contains("sim vs actual"));
        assert!(text.contains("winner match        2/2"));
    }

    #[test]
    fn consensus_rendering_counts_battlegrounds() {
        let runs = vec![
            vec![row("01_1", "alpha")],
            vec![row("01_1", "beta")],
            vec![row("01_1", "gamma")],
        ];
        let text = render_consensus(&build_consensus(&runs));
        assert!(text.contains("battleground"));
        assert!(text.contains("1 districts, 1 battlegrounds"));
    }
}
