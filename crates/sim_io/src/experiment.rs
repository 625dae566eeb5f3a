//! Experiment artifact store.
//!
//! Each run gets a directory named by its experiment id holding a fixed
//! artifact set: `metadata.json` (the ExperimentRecord), two CSV result
//! tables, `summary.json`, `validation_report.json`, and
//! `persona_decisions.json` (the full per-persona audit trail). Ground-truth
//! result sets live under `actual/` beside the experiments. Records are
//! written once at run completion and never mutated.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use sim_core::entities::{DistrictResult, RunSummary, ValidationReport, VoteDecision};
use sim_core::ids::{CandidateId, DistrictId, ExperimentId, PartyId};
use sim_core::params::SimParams;

use crate::{IoError, IoResult, json_err, tabular};

const METADATA: &str = "metadata.json";
const DISTRICT_CSV: &str = "district_results.csv";
const PROPORTIONAL_CSV: &str = "proportional_results.csv";
const SUMMARY: &str = "summary.json";
const VALIDATION: &str = "validation_report.json";
const DECISIONS: &str = "persona_decisions.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Where this run was produced; enough to tie a result to a source revision.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EnvironmentFingerprint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    pub os: String,
}

impl EnvironmentFingerprint {
    pub fn capture() -> Self {
        Self {
            git_commit: std::env::var("GIT_COMMIT").ok(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

/// One completed run's identity, inputs, and outcome. The unit of
/// comparison and reproducibility.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: ExperimentId,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    pub duration_secs: f64,
    pub description: String,
    pub tags: Vec<String>,
    pub params: SimParams,
    /// Logical name -> `sha256:<16 hex>` of the configuration bytes used.
    pub config_hashes: BTreeMap<String, String>,
    pub summary: RunSummary,
    pub validation: ValidationReport,
    pub environment: EnvironmentFingerprint,
}

impl ExperimentRecord {
    /// Mint the id for a run starting now with the given seed.
    pub fn mint_id(seed: u64) -> ExperimentId {
        let ts = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        ExperimentId::new(&ts, seed).expect("formatted timestamp is always valid")
    }
}

/// Flat per-district outcome row, the comparison currency. Ground-truth
/// ingestion produces the same shape, so simulated and actual results
/// compare through one code path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutcomeRow {
    pub district: DistrictId,
    pub district_name: String,
    pub total_personas: u32,
    pub turnout_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<CandidateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_party: Option<PartyId>,
    pub winner_votes: u32,
    pub runner_up_votes: u32,
    pub margin: u32,
    #[serde(default)]
    pub proportional_votes: BTreeMap<PartyId, u32>,
}

impl From<&DistrictResult> for OutcomeRow {
    fn from(r: &DistrictResult) -> Self {
        Self {
            district: r.district.clone(),
            district_name: r.district_name.clone(),
            total_personas: r.total_personas,
            turnout_rate: r.turnout_rate,
            winner: r.winner.clone(),
            winner_party: r.winner_party.clone(),
            winner_votes: r.winner_votes,
            runner_up_votes: r.runner_up_votes,
            margin: r.margin,
            proportional_votes: r.proportional_votes.clone(),
        }
    }
}

pub struct ExperimentStore {
    root: PathBuf,
}

impl ExperimentStore {
    pub fn open(root: impl Into<PathBuf>) -> IoResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("experiments"))?;
        fs::create_dir_all(root.join("actual"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_of(&self, id: &ExperimentId) -> PathBuf {
        self.root.join("experiments").join(id.as_str())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> IoResult<()> {
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|e| json_err(path, e))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /* ---------------------------- persist ---------------------------- */

    /// Write the full artifact set for a completed run.
    pub fn save(
        &self,
        record: &ExperimentRecord,
        results: &[DistrictResult],
        decisions: &BTreeMap<DistrictId, Vec<VoteDecision>>,
    ) -> IoResult<PathBuf> {
        let dir = self.dir_of(&record.id);
        fs::create_dir_all(&dir)?;

        self.write_json(&dir.join(METADATA), record)?;
        self.write_json(&dir.join(SUMMARY), &record.summary)?;
        self.write_json(&dir.join(VALIDATION), &record.validation)?;
        self.write_json(&dir.join(DECISIONS), decisions)?;

        let rows: Vec<Vec<String>> = results
            .iter()
            .map(|r| {
                vec![
                    r.district.to_string(),
                    r.district_name.clone(),
                    r.total_personas.to_string(),
                    r.turnout_count.to_string(),
                    r.turnout_rate.to_string(),
                    r.winner.as_ref().map(|c| c.to_string()).unwrap_or_default(),
                    r.winner_party.as_ref().map(|p| p.to_string()).unwrap_or_default(),
                    r.winner_votes.to_string(),
                    r.runner_up_votes.to_string(),
                    r.margin.to_string(),
                ]
            })
            .collect();
        fs::write(
            dir.join(DISTRICT_CSV),
            tabular::to_csv(
                &[
                    "district_id",
                    "district_name",
                    "total_personas",
                    "turnout_count",
                    "turnout_rate",
                    "winner",
                    "winner_party",
                    "winner_votes",
                    "runner_up_votes",
                    "margin",
                ],
                &rows,
            ),
        )?;

        let mut pr_rows = Vec::new();
        for r in results {
            for (party, votes) in &r.proportional_votes {
                pr_rows.push(vec![
                    r.district.to_string(),
                    party.to_string(),
                    votes.to_string(),
                ]);
            }
        }
        fs::write(
            dir.join(PROPORTIONAL_CSV),
            tabular::to_csv(&["district_id", "party_id", "votes"], &pr_rows),
        )?;

        info!(experiment = %record.id, districts = results.len(), "experiment saved");
        Ok(dir)
    }

    /* ---------------------------- retrieve ---------------------------- */

    /// All stored experiment ids, ascending (creation order by construction).
    pub fn list(&self) -> IoResult<Vec<ExperimentId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.root.join("experiments"))? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(id) = name.parse::<ExperimentId>() {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn load_record(&self, id: &ExperimentId) -> IoResult<ExperimentRecord> {
        let dir = self.dir_of(id);
        if !dir.is_dir() {
            return Err(IoError::ExperimentNotFound(id.clone()));
        }
        let path = dir.join(METADATA);
        if !path.is_file() {
            return Err(IoError::ArtifactNotFound {
                experiment: id.clone(),
                name: METADATA.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| json_err(&path, e))
    }

    /// Records carrying `tag`, ascending by id. Used for multi-seed consensus.
    pub fn records_with_tag(&self, tag: &str) -> IoResult<Vec<ExperimentRecord>> {
        let mut out = Vec::new();
        for id in self.list()? {
            let record = self.load_record(&id)?;
            if record.tags.iter().any(|t| t == tag) {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Reconstruct the per-district outcome rows from the CSV artifacts.
    pub fn load_outcomes(&self, id: &ExperimentId) -> IoResult<Vec<OutcomeRow>> {
        let dir = self.dir_of(id);
        if !dir.is_dir() {
            return Err(IoError::ExperimentNotFound(id.clone()));
        }
        let path = dir.join(DISTRICT_CSV);
        if !path.is_file() {
            return Err(IoError::ArtifactNotFound {
                experiment: id.clone(),
                name: DISTRICT_CSV.to_string(),
            });
        }
        let file = path.display().to_string();
        let content = fs::read_to_string(&path)?;
        let (_, rows) = tabular::from_csv(&content, &file)?;

        let bad = |msg: String| IoError::Tabular {
            file: file.clone(),
            msg,
        };
        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() < 10 {
                return Err(bad(format!("expected 10 columns, got {}", row.len())));
            }
            let parse_opt = |s: &str| -> Option<String> {
                if s.is_empty() { None } else { Some(s.to_string()) }
            };
            outcomes.push(OutcomeRow {
                district: row[0].parse().map_err(IoError::Core)?,
                district_name: row[1].clone(),
                total_personas: row[2].parse().map_err(|e| bad(format!("{e}")))?,
                turnout_rate: row[4].parse().map_err(|e| bad(format!("{e}")))?,
                winner: parse_opt(&row[5]).map(|s| s.parse()).transpose()?,
                winner_party: parse_opt(&row[6]).map(|s| s.parse()).transpose()?,
                winner_votes: row[7].parse().map_err(|e| bad(format!("{e}")))?,
                runner_up_votes: row[8].parse().map_err(|e| bad(format!("{e}")))?,
                margin: row[9].parse().map_err(|e| bad(format!("{e}")))?,
                proportional_votes: BTreeMap::new(),
            });
        }

        // Fold the list-ballot table back in.
        let pr_path = dir.join(PROPORTIONAL_CSV);
        if pr_path.is_file() {
            let pr_file = pr_path.display().to_string();
            let content = fs::read_to_string(&pr_path)?;
            let (_, rows) = tabular::from_csv(&content, &pr_file)?;
            for row in rows {
                if row.len() < 3 {
                    return Err(bad(format!("expected 3 columns, got {}", row.len())));
                }
                let district: DistrictId = row[0].parse().map_err(IoError::Core)?;
                let party: PartyId = row[1].parse().map_err(IoError::Core)?;
                let votes: u32 = row[2].parse().map_err(|e| bad(format!("{e}")))?;
                if let Some(o) = outcomes.iter_mut().find(|o| o.district == district) {
                    o.proportional_votes.insert(party, votes);
                }
            }
        }
        Ok(outcomes)
    }

    pub fn load_decisions(
        &self,
        id: &ExperimentId,
    ) -> IoResult<BTreeMap<DistrictId, Vec<VoteDecision>>> {
        let dir = self.dir_of(id);
        if !dir.is_dir() {
            return Err(IoError::ExperimentNotFound(id.clone()));
        }
        let path = dir.join(DECISIONS);
        if !path.is_file() {
            return Err(IoError::ArtifactNotFound {
                experiment: id.clone(),
                name: DECISIONS.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| json_err(&path, e))
    }

    /// Voting rationales from the decision audit trail, grouped by the party
    /// they supported. District and list reasons pool together.
    pub fn load_opinions(
        &self,
        id: &ExperimentId,
    ) -> IoResult<BTreeMap<PartyId, Vec<String>>> {
        let decisions = self.load_decisions(id)?;
        let mut opinions: BTreeMap<PartyId, Vec<String>> = BTreeMap::new();
        for decision in decisions.values().flatten() {
            if let (Some(party), Some(reason)) = (&decision.smd_party, &decision.smd_reason) {
                opinions.entry(party.clone()).or_default().push(reason.clone());
            }
            if let (Some(party), Some(reason)) =
                (&decision.proportional_party, &decision.proportional_reason)
            {
                opinions.entry(party.clone()).or_default().push(reason.clone());
            }
        }
        Ok(opinions)
    }

    /* ---------------------------- ground truth ---------------------------- */

    /// Store a named ground-truth result set for later comparison.
    pub fn ingest_actual(&self, name: &str, rows: &[OutcomeRow]) -> IoResult<PathBuf> {
        let path = self.root.join("actual").join(format!("{name}.json"));
        self.write_json(&path, &rows)?;
        Ok(path)
    }

    pub fn load_actual(&self, name: &str) -> IoResult<Vec<OutcomeRow>> {
        let path = self.root.join("actual").join(format!("{name}.json"));
        if !path.is_file() {
            return Err(IoError::ActualNotFound(name.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| json_err(&path, e))
    }
}
