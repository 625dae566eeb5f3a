//! Reference and run-scoped entities, with enumerated demographic domains.
//!
//! Demographic/political categories are sum types rather than string keys so
//! distribution tables get compile-time coverage (`ALL` arrays are the
//! canonical iteration order everywhere, including serialization).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{BlockId, CandidateId, DistrictId, PartyId, PersonaId};

/* ---------------------------- demographic domains ---------------------------- */

/// Census age bands; each carries its inclusive numeric range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    From18To29,
    From30To39,
    From40To49,
    From50To59,
    From60To69,
    From70Plus,
}

impl AgeBand {
    pub const ALL: [AgeBand; 6] = [
        AgeBand::From18To29,
        AgeBand::From30To39,
        AgeBand::From40To49,
        AgeBand::From50To59,
        AgeBand::From60To69,
        AgeBand::From70Plus,
    ];

    /// Inclusive (lo, hi) age range sampled within the band.
    pub fn range(self) -> (u8, u8) {
        match self {
            AgeBand::From18To29 => (18, 29),
            AgeBand::From30To39 => (30, 39),
            AgeBand::From40To49 => (40, 49),
            AgeBand::From50To59 => (50, 59),
            AgeBand::From60To69 => (60, 69),
            AgeBand::From70Plus => (70, 90),
        }
    }
}

/// Coarse life-stage grouping used by occupation/concern/info-source pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Young,
    Middle,
    Senior,
}

impl AgeGroup {
    pub fn of(age: u8) -> Self {
        if age < 30 {
            AgeGroup::Young
        } else if age < 60 {
            AgeGroup::Middle
        } else {
            AgeGroup::Senior
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndustrySector {
    Primary,
    Secondary,
    Tertiary,
}

impl IndustrySector {
    pub const ALL: [IndustrySector; 3] = [
        IndustrySector::Primary,
        IndustrySector::Secondary,
        IndustrySector::Tertiary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IndustrySector::Primary => "primary",
            IndustrySector::Secondary => "secondary",
            IndustrySector::Tertiary => "tertiary",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdType {
    Single,
    Couple,
    NuclearFamily,
    ThreeGeneration,
    Other,
}

impl HouseholdType {
    pub const ALL: [HouseholdType; 5] = [
        HouseholdType::Single,
        HouseholdType::Couple,
        HouseholdType::NuclearFamily,
        HouseholdType::ThreeGeneration,
        HouseholdType::Other,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeBracket {
    Low,
    Middle,
    High,
}

impl IncomeBracket {
    pub const ALL: [IncomeBracket; 3] =
        [IncomeBracket::Low, IncomeBracket::Middle, IncomeBracket::High];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    Secondary,
    Vocational,
    University,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 3] = [
        EducationLevel::Secondary,
        EducationLevel::Vocational,
        EducationLevel::University,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urbanization {
    Metropolis,
    RegionalHub,
    ProvincialCity,
    Rural,
}

/* ---------------------------- political domains ---------------------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ideology {
    Conservative,
    Centrist,
    Progressive,
    Apathetic,
}

impl Ideology {
    pub const ALL: [Ideology; 4] = [
        Ideology::Conservative,
        Ideology::Centrist,
        Ideology::Progressive,
        Ideology::Apathetic,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engagement {
    Low,
    Moderate,
    High,
}

impl Engagement {
    pub const ALL: [Engagement; 3] =
        [Engagement::Low, Engagement::Moderate, Engagement::High];
}

/// Persona party preference: a concrete party, or floating/undecided.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyAffinity {
    Party(PartyId),
    Undecided,
}

impl PartyAffinity {
    pub fn matches(&self, party: &PartyId) -> bool {
        matches!(self, PartyAffinity::Party(p) if p == party)
    }
}

/// Ordered volatility category. `Moderate` and above escalate to the oracle;
/// each level maps to a scoring-noise magnitude in the rule-based model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingLevel {
    VeryLow,
    Low,
    Moderate,
    ModerateHigh,
    High,
    VeryHigh,
}

impl SwingLevel {
    pub fn needs_oracle(self) -> bool {
        self >= SwingLevel::Moderate
    }

    /// Gaussian noise sigma applied to candidate scores at this level.
    pub fn noise_sigma(self) -> f64 {
        match self {
            SwingLevel::VeryLow => 0.05,
            SwingLevel::Low => 0.10,
            SwingLevel::Moderate => 0.20,
            SwingLevel::ModerateHigh => 0.25,
            SwingLevel::High => 0.35,
            SwingLevel::VeryHigh => 0.45,
        }
    }

    pub fn step_down(self) -> Self {
        match self {
            SwingLevel::VeryLow | SwingLevel::Low => SwingLevel::VeryLow,
            SwingLevel::Moderate => SwingLevel::Low,
            SwingLevel::ModerateHigh => SwingLevel::Moderate,
            SwingLevel::High => SwingLevel::ModerateHigh,
            SwingLevel::VeryHigh => SwingLevel::High,
        }
    }

    pub fn step_up(self) -> Self {
        match self {
            SwingLevel::VeryLow => SwingLevel::Low,
            SwingLevel::Low => SwingLevel::Moderate,
            SwingLevel::Moderate => SwingLevel::ModerateHigh,
            SwingLevel::ModerateHigh => SwingLevel::High,
            SwingLevel::High | SwingLevel::VeryHigh => SwingLevel::VeryHigh,
        }
    }
}

/* ---------------------------- reference entities ---------------------------- */

/// Per-cohort party-affinity scores used for policy alignment and
/// split-ticket reassignment. Cohorts are keyed by ideology; missing
/// entries fall back to a neutral 0.3.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlignmentTable(pub BTreeMap<Ideology, BTreeMap<PartyId, f64>>);

impl AlignmentTable {
    pub fn score(&self, ideology: Ideology, party: &PartyId) -> f64 {
        self.0
            .get(&ideology)
            .and_then(|m| m.get(party))
            .copied()
            .unwrap_or(0.3)
    }

    pub fn cohort(&self, ideology: Ideology) -> Option<&BTreeMap<PartyId, f64>> {
        self.0.get(&ideology)
    }
}

/// Immutable per-district reference data for one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct District {
    pub id: DistrictId,
    pub name: String,
    pub block: BlockId,
    /// Ratios aligned with `AgeBand::ALL`; need not sum exactly to 1.
    pub age_bands: [f64; 6],
    pub male_ratio: f64,
    /// Ratios aligned with `IndustrySector::ALL`.
    pub industry: [f64; 3],
    /// Ratios aligned with `HouseholdType::ALL`.
    pub households: [f64; 5],
    /// District-level income classification; individual brackets are derived.
    pub income_level: IncomeBracket,
    /// Share of residents with a university degree.
    pub university_rate: f64,
    pub urbanization: Urbanization,
    /// Baseline party support shares; floating voters are tracked separately.
    pub party_support: BTreeMap<PartyId, f64>,
    /// Undecided / floating-vote ratio.
    pub floating_ratio: f64,
    pub regional_issues: Vec<String>,
    pub historical_turnout: f64,
}

impl District {
    /// Baseline support share for `party`, 0 when unknown.
    pub fn support_for(&self, party: &PartyId) -> f64 {
        self.party_support.get(party).copied().unwrap_or(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Incumbent,
    Former,
    New,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub district: DistrictId,
    pub party: PartyId,
    pub status: CandidateStatus,
    pub previous_wins: u32,
    /// Also listed on the party list (eligible for PR revival).
    pub dual_candidacy: bool,
}

/* ---------------------------- run-scoped entities ---------------------------- */

/// A synthetic voter. Created once per run by the sampler, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub district: DistrictId,
    pub age: u8,
    pub gender: Gender,
    pub occupation: String,
    pub sector: IndustrySector,
    pub household: HouseholdType,
    pub income: IncomeBracket,
    pub education: EducationLevel,
    pub urbanization: Urbanization,
    pub ideology: Ideology,
    pub engagement: Engagement,
    pub affinity: PartyAffinity,
    pub swing: SwingLevel,
    /// Clamped to [0.05, 0.95] at construction.
    pub turnout_probability: f64,
    pub concerns: Vec<String>,
    pub info_sources: Vec<String>,
}

/// Provenance tag for a terminal decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    Rule,
    Oracle,
    Fallback,
    Calibrated,
}

/// Exactly one terminal decision exists per persona. When `will_vote` is
/// false both ballot fields are `None`; the constructors keep that invariant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteDecision {
    pub persona: PersonaId,
    pub will_vote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstention_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smd_candidate: Option<CandidateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smd_party: Option<PartyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proportional_party: Option<PartyId>,
    pub confidence: f64,
    pub method: DecisionMethod,
    pub swing: SwingLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smd_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proportional_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub swing_factors: Vec<String>,
}

impl VoteDecision {
    pub fn abstain(persona: PersonaId, swing: SwingLevel, reason: String) -> Self {
        Self {
            persona,
            will_vote: false,
            abstention_reason: Some(reason),
            smd_candidate: None,
            smd_party: None,
            proportional_party: None,
            confidence: 0.0,
            method: DecisionMethod::Rule,
            swing,
            smd_reason: None,
            proportional_reason: None,
            swing_factors: Vec::new(),
        }
    }

    pub fn ballot(
        persona: PersonaId,
        swing: SwingLevel,
        method: DecisionMethod,
        smd_candidate: Option<CandidateId>,
        smd_party: Option<PartyId>,
        proportional_party: Option<PartyId>,
        confidence: f64,
    ) -> Self {
        Self {
            persona,
            will_vote: true,
            abstention_reason: None,
            smd_candidate,
            smd_party,
            proportional_party,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            swing,
            smd_reason: None,
            proportional_reason: None,
            swing_factors: Vec::new(),
        }
    }
}

/* ---------------------------- derived results ---------------------------- */

/// Per-cohort tallies inside a district result.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CohortStats {
    pub count: u32,
    pub voted: u32,
    pub smd_parties: BTreeMap<PartyId, u32>,
    pub proportional_parties: BTreeMap<PartyId, u32>,
}

/// One district's aggregated outcome; immutable once computed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistrictResult {
    pub district: DistrictId,
    pub district_name: String,
    pub total_personas: u32,
    pub turnout_count: u32,
    pub turnout_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<CandidateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_party: Option<PartyId>,
    pub winner_votes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_up: Option<CandidateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_up_party: Option<PartyId>,
    pub runner_up_votes: u32,
    pub margin: u32,
    pub smd_votes: BTreeMap<CandidateId, u32>,
    pub proportional_votes: BTreeMap<PartyId, u32>,
    pub cohorts: BTreeMap<String, CohortStats>,
    pub abstention_reasons: Vec<String>,
}

/// Signed target-versus-predicted gap for one party in one district.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationSignal {
    pub district: DistrictId,
    pub party: PartyId,
    pub target_share: f64,
    pub predicted_share: f64,
    /// `target_share - predicted_share`.
    pub correction: f64,
}

/// Outcome of one named validation check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Structured check battery report for a completed run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<ValidationCheck>,
    /// Failed non-fatal checks, in check order.
    pub warnings: Vec<String>,
    /// Failed fatal checks; a non-empty list invalidates the run.
    pub errors: Vec<String>,
    pub passed: bool,
}

/// National roll-up of one run: seat totals and the majority line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub districts_simulated: u32,
    pub failed_districts: Vec<DistrictId>,
    pub national_turnout: f64,
    /// District seats won per party.
    pub smd_seats: BTreeMap<PartyId, u32>,
    /// Proportional seats per block.
    pub pr_seats_by_block: BTreeMap<BlockId, BTreeMap<PartyId, u32>>,
    /// Proportional seats summed over blocks.
    pub pr_seats_total: BTreeMap<PartyId, u32>,
    /// District plus proportional seats per party.
    pub total_seats: BTreeMap<PartyId, u32>,
    pub majority_threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub majority_party: Option<PartyId>,
}

/* ---------------------------- boundary types ---------------------------- */

/// Turnout modifier from the weather feed, bounded to [-0.15, +0.03].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub turnout_modifier: f64,
    pub description: String,
    pub source: WeatherSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherSource {
    Primary,
    Secondary,
    Static,
}

impl Default for WeatherInfo {
    fn default() -> Self {
        Self {
            turnout_modifier: 0.0,
            description: "clear".to_string(),
            source: WeatherSource::Static,
        }
    }
}
