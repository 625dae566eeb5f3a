//! Post-run sanity battery.
//!
//! Fatal checks (accounting identities) land in `errors` and invalidate the
//! run; plausibility checks (bands, cohort tendencies) only warn. The bands
//! and the cohort checks come from `ValidationConfig`, so expectations can
//! change without touching aggregation code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sim_core::entities::{DistrictResult, RunSummary, ValidationCheck, ValidationReport};
use sim_core::ids::PartyId;
use sim_io::reference::ReferenceSet;

/// Expect a cohort to give a party a bounded share of its list votes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CohortTendencyCheck {
    pub cohort: String,
    pub party: PartyId,
    #[serde(default)]
    pub min_share: Option<f64>,
    #[serde(default)]
    pub max_share: Option<f64>,
}

/// Expect one cohort to out-turnout another nationally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnoutOrderingCheck {
    pub higher: String,
    pub lower: String,
}

/// Tunable expectations; the defaults reflect recent national elections.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub national_turnout_band: (f64, f64),
    pub district_turnout_band: (f64, f64),
    /// Largest plausible national share of the proportional vote for one
    /// party.
    pub max_leading_share: f64,
    /// Largest plausible share of district seats for one party.
    pub max_party_seat_share: f64,
    pub cohort_tendency: Vec<CohortTendencyCheck>,
    pub turnout_ordering: Vec<TurnoutOrderingCheck>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            national_turnout_band: (0.30, 0.85),
            district_turnout_band: (0.05, 0.95),
            max_leading_share: 0.70,
            max_party_seat_share: 0.85,
            cohort_tendency: Vec::new(),
            turnout_ordering: Vec::new(),
        }
    }
}

struct Battery {
    checks: Vec<ValidationCheck>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl Battery {
    fn new() -> Self {
        Self {
            checks: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn fatal(&mut self, name: &str, passed: bool, detail: String) {
        if !passed {
            self.errors.push(format!("{name}: {detail}"));
        }
        self.checks.push(ValidationCheck {
            name: name.to_string(),
            passed,
            detail,
        });
    }

    fn advisory(&mut self, name: &str, passed: bool, detail: String) {
        if !passed {
            self.warnings.push(format!("{name}: {detail}"));
        }
        self.checks.push(ValidationCheck {
            name: name.to_string(),
            passed,
            detail,
        });
    }

    fn finish(self) -> ValidationReport {
        let passed = self.errors.is_empty();
        ValidationReport {
            checks: self.checks,
            warnings: self.warnings,
            errors: self.errors,
            passed,
        }
    }
}

/// Run every check against a completed run.
pub fn validate_run(
    results: &[DistrictResult],
    summary: &RunSummary,
    reference: &ReferenceSet,
    config: &ValidationConfig,
) -> ValidationReport {
    let mut battery = Battery::new();

    battery.fatal(
        "districts_simulated",
        !results.is_empty(),
        format!(
            "{} of {} districts produced results",
            results.len(),
            reference.districts.len()
        ),
    );

    // Accounting identity: every ballot counted once.
    let miscounted: Vec<String> = results
        .iter()
        .filter(|r| {
            let smd: u32 = r.smd_votes.values().sum();
            smd > r.turnout_count || r.turnout_count > r.total_personas
        })
        .map(|r| r.district.to_string())
        .collect();
    battery.fatal(
        "ballot_accounting",
        miscounted.is_empty(),
        if miscounted.is_empty() {
            "smd votes <= turnout <= personas in every district".to_string()
        } else {
            format!("inconsistent counts in: {}", miscounted.join(", "))
        },
    );

    // A district with any turnout must have a winner with votes.
    let voteless: Vec<String> = results
        .iter()
        .filter(|r| r.turnout_count > 0 && (r.winner.is_none() || r.winner_votes == 0))
        .map(|r| r.district.to_string())
        .collect();
    battery.fatal(
        "winner_present",
        voteless.is_empty(),
        if voteless.is_empty() {
            "every contested district has a winner".to_string()
        } else {
            format!("turnout but no winner in: {}", voteless.join(", "))
        },
    );

    // Proportional seats never exceed the block's allotment.
    let overdrawn: Vec<String> = summary
        .pr_seats_by_block
        .iter()
        .filter(|(block, seats)| {
            let won: u32 = seats.values().sum();
            reference.block_seats.get(block).map_or(true, |&cap| won > cap)
        })
        .map(|(block, _)| block.to_string())
        .collect();
    battery.fatal(
        "block_seat_caps",
        overdrawn.is_empty(),
        if overdrawn.is_empty() {
            "all block allocations within their allotment".to_string()
        } else {
            format!("over-allocated blocks: {}", overdrawn.join(", "))
        },
    );

    band_checks(&mut battery, results, summary, config);
    cohort_checks(&mut battery, results, config);

    battery.finish()
}

fn band_checks(
    battery: &mut Battery,
    results: &[DistrictResult],
    summary: &RunSummary,
    config: &ValidationConfig,
) {
    let (lo, hi) = config.national_turnout_band;
    battery.advisory(
        "national_turnout_band",
        results.is_empty() || (summary.national_turnout >= lo && summary.national_turnout <= hi),
        format!(
            "national turnout {:.3} (plausible band {lo:.2}..{hi:.2})",
            summary.national_turnout
        ),
    );

    let (dlo, dhi) = config.district_turnout_band;
    let extreme: Vec<String> = results
        .iter()
        .filter(|r| r.turnout_rate < dlo || r.turnout_rate > dhi)
        .map(|r| format!("{} ({:.3})", r.district, r.turnout_rate))
        .collect();
    battery.advisory(
        "district_turnout_extremes",
        extreme.is_empty(),
        if extreme.is_empty() {
            "all district turnouts within band".to_string()
        } else {
            format!("extreme turnout in: {}", extreme.join(", "))
        },
    );

    let mut pr_by_party: BTreeMap<&PartyId, u64> = BTreeMap::new();
    for r in results {
        for (party, &v) in &r.proportional_votes {
            *pr_by_party.entry(party).or_insert(0) += u64::from(v);
        }
    }
    let pr_pool: u64 = pr_by_party.values().sum();
    let leading_share = if pr_pool > 0 {
        pr_by_party.values().copied().max().unwrap_or(0) as f64 / pr_pool as f64
    } else {
        0.0
    };
    battery.advisory(
        "leading_list_share",
        leading_share <= config.max_leading_share,
        format!("leading party holds {leading_share:.3} of the proportional vote"),
    );

    let seat_share = if summary.districts_simulated > 0 {
        summary.smd_seats.values().copied().max().unwrap_or(0) as f64
            / f64::from(summary.districts_simulated)
    } else {
        0.0
    };
    battery.advisory(
        "party_seat_band",
        seat_share <= config.max_party_seat_share,
        format!("leading party holds {seat_share:.3} of the district seats"),
    );
}

/// Cohort totals pooled over every district, keyed by cohort label.
struct CohortTotals {
    count: u64,
    voted: u64,
    proportional: BTreeMap<PartyId, u64>,
}

fn cohort_checks(battery: &mut Battery, results: &[DistrictResult], config: &ValidationConfig) {
    if config.cohort_tendency.is_empty() && config.turnout_ordering.is_empty() {
        return;
    }

    let mut totals: BTreeMap<&str, CohortTotals> = BTreeMap::new();
    for r in results {
        for (label, stats) in &r.cohorts {
            let entry = totals.entry(label.as_str()).or_insert(CohortTotals {
                count: 0,
                voted: 0,
                proportional: BTreeMap::new(),
            });
            entry.count += u64::from(stats.count);
            entry.voted += u64::from(stats.voted);
            for (party, &v) in &stats.proportional_parties {
                *entry.proportional.entry(party.clone()).or_insert(0) += u64::from(v);
            }
        }
    }

    for check in &config.cohort_tendency {
        let name = format!("cohort_tendency[{}/{}]", check.cohort, check.party);
        let Some(cohort) = totals.get(check.cohort.as_str()) else {
            battery.advisory(&name, false, format!("cohort {} absent", check.cohort));
            continue;
        };
        let pool: u64 = cohort.proportional.values().sum();
        let share = if pool > 0 {
            cohort.proportional.get(&check.party).copied().unwrap_or(0) as f64 / pool as f64
        } else {
            0.0
        };
        let ok = check.min_share.map_or(true, |m| share >= m)
            && check.max_share.map_or(true, |m| share <= m);
        battery.advisory(
            &name,
            ok,
            format!(
                "{} gives {} share {share:.3} (bounds {:?}..{:?})",
                check.cohort, check.party, check.min_share, check.max_share
            ),
        );
    }

    for check in &config.turnout_ordering {
        let name = format!("turnout_ordering[{}>={}]", check.higher, check.lower);
        let rate = |label: &str| {
            totals
                .get(label)
                .filter(|t| t.count > 0)
                .map(|t| t.voted as f64 / t.count as f64)
        };
        match (rate(&check.higher), rate(&check.lower)) {
            (Some(h), Some(l)) => {
                battery.advisory(
                    &name,
                    h >= l,
                    format!("{} turnout {h:.3} vs {} turnout {l:.3}", check.higher, check.lower),
                );
            }
            _ => {
                battery.advisory(&name, false, "cohort missing from results".to_string());
            }
        }
    }
}
