//! Run parameters and decision-factor weights.
//!
//! Parameters are plain serde structs with conservative defaults; range
//! checks happen in `validate`, not at field access.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Weights of the six scoring factors in the rule-based decision model.
/// Defaults sum to 1.0; positive sums are accepted and normalized by use.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FactorWeights {
    pub party_loyalty: f64,
    pub policy_alignment: f64,
    pub candidate_appeal: f64,
    pub media_influence: f64,
    pub local_connection: f64,
    pub strategic_voting: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            party_loyalty: 0.30,
            policy_alignment: 0.25,
            candidate_appeal: 0.20,
            media_influence: 0.10,
            local_connection: 0.10,
            strategic_voting: 0.05,
        }
    }
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.party_loyalty
            + self.policy_alignment
            + self.candidate_appeal
            + self.media_influence
            + self.local_connection
            + self.strategic_voting
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let all = [
            self.party_loyalty,
            self.policy_alignment,
            self.candidate_appeal,
            self.media_influence,
            self.local_connection,
            self.strategic_voting,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CoreError::DomainOutOfRange("factor weight"));
        }
        if !(self.sum() > 0.0) {
            return Err(CoreError::DomainOutOfRange("factor weight sum"));
        }
        Ok(())
    }
}

/// All knobs of one simulation run. Serialized verbatim into the experiment
/// metadata so a stored run can be replayed from its snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SimParams {
    /// Run seed; the single source of randomness.
    pub seed: u64,
    pub personas_per_district: u32,
    pub weights: FactorWeights,
    /// Added to every level's noise sigma (may be negative).
    pub swing_noise_offset: f64,
    /// Loyalty score an undecided persona grants any party.
    pub independent_loyalty: f64,
    /// Flat addition to every turnout probability before clamping.
    pub turnout_boost: f64,
    pub calibration_enabled: bool,
    /// Fraction of the over-representation gap converted into flip
    /// probability; 0 disables flips even when calibration runs.
    pub calibration_strength: f64,
    /// Personas per oracle request.
    pub oracle_batch_size: u32,
    /// Global ceiling on in-flight oracle requests.
    pub max_api_concurrency: u32,
    /// Ceiling on districts simulated at once.
    pub max_district_concurrency: u32,
    /// Attempts per oracle batch before falling back.
    pub oracle_retries: u32,
    /// Pause after each dispatched batch, in milliseconds.
    pub inter_batch_delay_ms: u64,
    /// PR seats needed for the summary's majority line.
    pub majority_threshold: u32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            seed: 42,
            personas_per_district: 100,
            weights: FactorWeights::default(),
            swing_noise_offset: 0.0,
            independent_loyalty: 0.3,
            turnout_boost: 0.0,
            calibration_enabled: false,
            calibration_strength: 0.5,
            oracle_batch_size: 15,
            max_api_concurrency: 5,
            max_district_concurrency: 3,
            oracle_retries: 3,
            inter_batch_delay_ms: 1000,
            majority_threshold: 233,
        }
    }
}

impl SimParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.weights.validate()?;
        if self.personas_per_district == 0 {
            return Err(CoreError::DomainOutOfRange("personas_per_district"));
        }
        if self.oracle_batch_size == 0 {
            return Err(CoreError::DomainOutOfRange("oracle_batch_size"));
        }
        if self.max_api_concurrency == 0 || self.max_district_concurrency == 0 {
            return Err(CoreError::DomainOutOfRange("concurrency limit"));
        }
        if !(0.0..=1.0).contains(&self.independent_loyalty) {
            return Err(CoreError::DomainOutOfRange("independent_loyalty"));
        }
        if !(0.0..=1.0).contains(&self.calibration_strength) {
            return Err(CoreError::DomainOutOfRange("calibration_strength"));
        }
        if !self.swing_noise_offset.is_finite() || !self.turnout_boost.is_finite() {
            return Err(CoreError::DomainOutOfRange("modifier"));
        }
        Ok(())
    }
}
