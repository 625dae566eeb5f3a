//! Reference-data loading: districts, candidate rosters, cohort alignment
//! scores, block seat counts, and the optional contextual datasets consumed
//! by prompt construction.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use sim_core::entities::{AlignmentTable, Candidate, District};
use sim_core::ids::BlockId;

use crate::{IoError, IoResult, json_err};

/// Everything a run needs that is not a parameter: the electoral map.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub districts: Vec<District>,
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub alignment: AlignmentTable,
    /// Proportional seats available per block.
    #[serde(default)]
    pub block_seats: BTreeMap<BlockId, u32>,
}

impl ReferenceSet {
    /// Candidates standing in `district`, in file order.
    pub fn candidates_for(&self, district: &sim_core::ids::DistrictId) -> Vec<&Candidate> {
        self.candidates
            .iter()
            .filter(|c| &c.district == district)
            .collect()
    }

    /// Integrity checks; issues are returned sorted for stable reporting.
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.districts.is_empty() {
            issues.push("no districts defined".to_string());
        }
        let mut seen = std::collections::BTreeSet::new();
        for d in &self.districts {
            if !seen.insert(&d.id) {
                issues.push(format!("duplicate district id: {}", d.id));
            }
            if !self.block_seats.contains_key(&d.block) {
                issues.push(format!("district {} references unknown block {}", d.id, d.block));
            }
        }
        for c in &self.candidates {
            if !self.districts.iter().any(|d| d.id == c.district) {
                issues.push(format!(
                    "candidate {} references unknown district {}",
                    c.id, c.district
                ));
            }
        }
        issues.sort();
        issues
    }
}

/// Load and integrity-check a reference set from one JSON file.
pub fn load_reference(path: &Path) -> IoResult<ReferenceSet> {
    let content = fs::read_to_string(path)?;
    let set: ReferenceSet =
        serde_json::from_str(&content).map_err(|e| json_err(path, e))?;
    let issues = set.integrity_issues();
    if !issues.is_empty() {
        return Err(IoError::InvalidReference(issues.join("; ")));
    }
    info!(
        districts = set.districts.len(),
        candidates = set.candidates.len(),
        blocks = set.block_seats.len(),
        "reference set loaded"
    );
    Ok(set)
}

/* ---------------------------- contextual datasets ---------------------------- */

/// One real past election, rendered into oracle prompts as factual grounding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PastElection {
    pub election_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(default)]
    pub national_turnout: Option<f64>,
    /// Party id -> seats won.
    #[serde(default)]
    pub national_seats: BTreeMap<String, u32>,
    #[serde(default)]
    pub key_trends: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PastElections {
    #[serde(default)]
    pub elections: Vec<PastElection>,
}

/// Headline economic indicators rendered into oracle prompts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EconomicContext {
    #[serde(default)]
    pub gdp_growth_rate: Option<f64>,
    #[serde(default)]
    pub cpi_year_over_year: Option<f64>,
    #[serde(default)]
    pub unemployment_rate: Option<f64>,
    #[serde(default)]
    pub real_wage_change: Option<f64>,
    #[serde(default)]
    pub labor_market: Option<String>,
    #[serde(default)]
    pub consumer_sentiment: Option<String>,
}

/// Load an optional contextual dataset; a missing file is simply `None`.
pub fn load_optional<T: serde::de::DeserializeOwned>(path: &Path) -> IoResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(
        serde_json::from_str(&content).map_err(|e| json_err(path, e))?,
    ))
}
