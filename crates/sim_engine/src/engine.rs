//! The per-run driver.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use sim_algo::aggregate::aggregate_district;
use sim_algo::allocation::allocate_dhondt;
use sim_algo::calibrate::{calibrate_decisions, compute_calibration_signals};
use sim_algo::decide::{decide_persona, DecisionContext};
use sim_algo::sampler::sample_district_personas;
use sim_core::entities::{
    CalibrationSignal, Candidate, District, DistrictResult, Persona, RunSummary, VoteDecision,
};
use sim_core::ids::{BlockId, DistrictId, PartyId};
use sim_core::params::SimParams;
use sim_core::rng::SimRng;
use sim_io::experiment::{EnvironmentFingerprint, ExperimentRecord, RunStatus};
use sim_io::hasher::{sha256_value, snapshot_tag};
use sim_io::memory::{MemoryEpisode, MemoryStore};
use sim_io::reference::{EconomicContext, PastElections, ReferenceSet};
use sim_oracle::{dispatch_district, DecisionOracle, WeatherService};

use crate::validate::{validate_run, ValidationConfig};
use crate::EngineError;

/// Everything a completed run produces, ready for the experiment store.
pub struct RunArtifacts {
    pub record: ExperimentRecord,
    pub results: Vec<DistrictResult>,
    pub decisions: BTreeMap<DistrictId, Vec<VoteDecision>>,
}

struct DistrictOutput {
    result: DistrictResult,
    decisions: Vec<VoteDecision>,
    signals: Vec<CalibrationSignal>,
}

/// One configured simulation. Owns the reference set and parameters;
/// `run` may be called repeatedly (each call mints a fresh experiment).
pub struct SimulationEngine {
    reference: ReferenceSet,
    params: SimParams,
    memory: MemoryStore,
    weather: WeatherService,
    oracle: Option<Arc<dyn DecisionOracle>>,
    past_elections: Option<PastElections>,
    economy: Option<EconomicContext>,
    validation: ValidationConfig,
}

impl SimulationEngine {
    pub fn new(
        reference: ReferenceSet,
        params: SimParams,
        memory: MemoryStore,
    ) -> Result<Self, EngineError> {
        params.validate()?;
        if reference.districts.is_empty() {
            return Err(EngineError::EmptyReference);
        }
        Ok(Self {
            reference,
            params,
            memory,
            weather: WeatherService::offline(),
            oracle: None,
            past_elections: None,
            economy: None,
            validation: ValidationConfig::default(),
        })
    }

    /// Escalate high-swing personas to this oracle. Without one, every
    /// decision stays rule-scored.
    pub fn with_oracle(mut self, oracle: Arc<dyn DecisionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_weather(mut self, weather: WeatherService) -> Self {
        self.weather = weather;
        self
    }

    /// Real-world context injected into oracle prompts.
    pub fn with_history(
        mut self,
        past: Option<PastElections>,
        economy: Option<EconomicContext>,
    ) -> Self {
        self.past_elections = past;
        self.economy = economy;
        self
    }

    /// Replace the default validation bands and cohort checks.
    pub fn with_validation(mut self, config: ValidationConfig) -> Self {
        self.validation = config;
        self
    }

    /// Simulate every district, roll up seats, validate, and record memory.
    /// Districts that fail are noted in the summary; the run continues.
    pub async fn run(
        &self,
        description: &str,
        tags: Vec<String>,
    ) -> Result<RunArtifacts, EngineError> {
        let started = Instant::now();
        let id = ExperimentRecord::mint_id(self.params.seed);
        let created_at = Utc::now();
        info!(experiment = %id, districts = self.reference.districts.len(), "run started");

        let api_permits = Arc::new(Semaphore::new(self.params.max_api_concurrency.max(1) as usize));
        let district_permits = Arc::new(Semaphore::new(
            self.params.max_district_concurrency.max(1) as usize,
        ));

        let tasks = self.reference.districts.iter().map(|district| {
            let api = Arc::clone(&api_permits);
            let gate = Arc::clone(&district_permits);
            async move {
                let _permit = gate.acquire().await;
                let output = self.simulate_district(district, api).await;
                (district.id.clone(), output)
            }
        });

        let mut results = Vec::new();
        let mut decisions: BTreeMap<DistrictId, Vec<VoteDecision>> = BTreeMap::new();
        let mut signals: BTreeMap<DistrictId, Vec<CalibrationSignal>> = BTreeMap::new();
        let mut failed: Vec<DistrictId> = Vec::new();
        for (district_id, output) in join_all(tasks).await {
            match output {
                Ok(out) => {
                    decisions.insert(district_id.clone(), out.decisions);
                    signals.insert(district_id, out.signals);
                    results.push(out.result);
                }
                Err(err) => {
                    warn!(district = %district_id, %err, "district failed, continuing");
                    failed.push(district_id);
                }
            }
        }

        let summary = self.summarize(&results, failed)?;
        let validation = validate_run(&results, &summary, &self.reference, &self.validation);
        let status = if results.is_empty() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        let mut config_hashes = BTreeMap::new();
        config_hashes.insert(
            "reference".to_string(),
            snapshot_tag(&sha256_value(&self.reference)?),
        );
        config_hashes.insert(
            "params".to_string(),
            snapshot_tag(&sha256_value(&self.params)?),
        );

        self.record_memory(&id, &results, &signals)?;

        let record = ExperimentRecord {
            id,
            created_at,
            status,
            duration_secs: started.elapsed().as_secs_f64(),
            description: description.to_string(),
            tags,
            params: self.params.clone(),
            config_hashes,
            summary,
            validation,
            environment: EnvironmentFingerprint::capture(),
        };
        info!(
            experiment = %record.id,
            simulated = record.summary.districts_simulated,
            failed = record.summary.failed_districts.len(),
            passed = record.validation.passed,
            "run finished"
        );
        Ok(RunArtifacts {
            record,
            results,
            decisions,
        })
    }

    async fn simulate_district(
        &self,
        district: &District,
        api_permits: Arc<Semaphore>,
    ) -> Result<DistrictOutput, EngineError> {
        let candidates: Vec<Candidate> = self
            .reference
            .candidates_for(&district.id)
            .into_iter()
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(EngineError::NoCandidates(district.id.clone()));
        }

        let weather = self.weather.lookup(&district.id).await;
        let personas = sample_district_personas(district, &self.params, weather.turnout_modifier);

        let ctx = DecisionContext {
            district,
            candidates: &candidates,
            alignment: &self.reference.alignment,
            params: &self.params,
            weather_modifier: weather.turnout_modifier,
        };
        let mut rng = SimRng::for_scope(self.params.seed, &format!("{}/decide", district.id));
        let mut decisions: Vec<VoteDecision> = Vec::with_capacity(personas.len());
        let mut escalated: Vec<usize> = Vec::new();
        for (i, persona) in personas.iter().enumerate() {
            let scored = decide_persona(persona, &ctx, &mut rng);
            if scored.needs_oracle && self.oracle.is_some() {
                escalated.push(i);
            }
            decisions.push(scored.decision);
        }

        if let Some(oracle) = &self.oracle {
            if !escalated.is_empty() {
                let context = self.memory.context_for_prompt(
                    &district.id,
                    self.past_elections.as_ref(),
                    self.economy.as_ref(),
                )?;
                let subset: Vec<Persona> =
                    escalated.iter().map(|&i| personas[i].clone()).collect();
                let rules: Vec<VoteDecision> =
                    escalated.iter().map(|&i| decisions[i].clone()).collect();
                let adjudicated = dispatch_district(
                    Arc::clone(oracle),
                    district,
                    &candidates,
                    &subset,
                    &rules,
                    &self.params,
                    &context,
                    api_permits,
                )
                .await;
                for (&slot, decision) in escalated.iter().zip(adjudicated) {
                    decisions[slot] = decision;
                }
            }
        }

        if self.params.calibration_enabled {
            let mut crng =
                SimRng::for_scope(self.params.seed, &format!("{}/calibrate", district.id));
            calibrate_decisions(
                &mut decisions,
                district,
                self.params.calibration_strength,
                &mut crng,
            );
        }

        let signals = compute_calibration_signals(&decisions, district);
        let result = aggregate_district(district, &personas, &decisions, &candidates);
        info!(
            district = %district.id,
            weather = %weather.description,
            turnout = result.turnout_rate,
            winner = ?result.winner_party,
            "district simulated"
        );
        Ok(DistrictOutput {
            result,
            decisions,
            signals,
        })
    }

    /* ---------------------------- national roll-up ---------------------------- */

    fn summarize(
        &self,
        results: &[DistrictResult],
        failed: Vec<DistrictId>,
    ) -> Result<RunSummary, EngineError> {
        let mut smd_seats: BTreeMap<PartyId, u32> = BTreeMap::new();
        for r in results {
            if let Some(party) = &r.winner_party {
                *smd_seats.entry(party.clone()).or_insert(0) += 1;
            }
        }

        let total_personas: u64 = results.iter().map(|r| u64::from(r.total_personas)).sum();
        let voted: u64 = results.iter().map(|r| u64::from(r.turnout_count)).sum();
        let national_turnout = if total_personas > 0 {
            voted as f64 / total_personas as f64
        } else {
            0.0
        };

        // Proportional votes pooled per block, then D'Hondt per block.
        let block_of: BTreeMap<&DistrictId, &BlockId> = self
            .reference
            .districts
            .iter()
            .map(|d| (&d.id, &d.block))
            .collect();
        let mut block_votes: BTreeMap<BlockId, BTreeMap<PartyId, u64>> = BTreeMap::new();
        for r in results {
            let Some(block) = block_of.get(&r.district) else {
                continue;
            };
            let pool = block_votes.entry((*block).clone()).or_default();
            for (party, votes) in &r.proportional_votes {
                *pool.entry(party.clone()).or_insert(0) += u64::from(*votes);
            }
        }

        let mut pr_seats_by_block: BTreeMap<BlockId, BTreeMap<PartyId, u32>> = BTreeMap::new();
        let mut pr_seats_total: BTreeMap<PartyId, u32> = BTreeMap::new();
        for (block, &seats) in &self.reference.block_seats {
            let Some(votes) = block_votes.get(block) else {
                continue;
            };
            if votes.values().all(|&v| v == 0) {
                continue;
            }
            let allocated = allocate_dhondt(seats, votes)?;
            for (party, &won) in &allocated {
                *pr_seats_total.entry(party.clone()).or_insert(0) += won;
            }
            pr_seats_by_block.insert(block.clone(), allocated);
        }

        let mut total_seats = smd_seats.clone();
        for (party, &won) in &pr_seats_total {
            *total_seats.entry(party.clone()).or_insert(0) += won;
        }
        let majority_party = total_seats
            .iter()
            .find(|(_, &s)| s >= self.params.majority_threshold)
            .map(|(party, _)| party.clone());

        Ok(RunSummary {
            districts_simulated: results.len() as u32,
            failed_districts: failed,
            national_turnout,
            smd_seats,
            pr_seats_by_block,
            pr_seats_total,
            total_seats,
            majority_threshold: self.params.majority_threshold,
            majority_party,
        })
    }

    /// Feed this run back into per-district memory.
    fn record_memory(
        &self,
        id: &sim_core::ids::ExperimentId,
        results: &[DistrictResult],
        signals: &BTreeMap<DistrictId, Vec<CalibrationSignal>>,
    ) -> Result<(), EngineError> {
        let method = if self.params.calibration_enabled {
            "calibrated"
        } else if self.oracle.is_some() {
            "oracle"
        } else {
            "rule"
        };
        for result in results {
            let pool: u64 = result
                .proportional_votes
                .values()
                .map(|&v| u64::from(v))
                .sum();
            let party_vote_shares = result
                .proportional_votes
                .iter()
                .map(|(party, &votes)| {
                    let share = if pool > 0 {
                        f64::from(votes) / pool as f64
                    } else {
                        0.0
                    };
                    (party.clone(), share)
                })
                .collect();
            let episode = MemoryEpisode {
                experiment: id.clone(),
                timestamp: Utc::now(),
                total_personas: result.total_personas,
                turnout_rate: result.turnout_rate,
                winner_party: result.winner_party.clone(),
                party_vote_shares,
                method: method.to_string(),
                calibration_strength: if self.params.calibration_enabled {
                    self.params.calibration_strength
                } else {
                    0.0
                },
            };
            let district_signals = signals
                .get(&result.district)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            self.memory
                .record_run(&result.district, episode, district_signals)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::entities::{
        AlignmentTable, CandidateStatus, IncomeBracket, Urbanization,
    };
    use tempfile::TempDir;

    fn district(id: &str, block: &str) -> District {
        District {
            id: id.parse().unwrap(),
            name: format!("District {id}"),
            block: block.parse().unwrap(),
            age_bands: [0.10, 0.15, 0.18, 0.20, 0.19, 0.18],
            male_ratio: 0.49,
            industry: [0.05, 0.25, 0.70],
            households: [0.3, 0.25, 0.25, 0.15, 0.05],
            income_level: IncomeBracket::Middle,
            university_rate: 0.35,
            urbanization: Urbanization::ProvincialCity,
            party_support: [("alpha".parse().unwrap(), 0.38), ("beta".parse().unwrap(), 0.27)]
                .into_iter()
                .collect(),
            floating_ratio: 0.35,
            regional_issues: vec!["rail service cuts".into()],
            historical_turnout: 0.55,
        }
    }

    fn candidate(id: &str, name: &str, district: &str, party: &str, incumbent: bool) -> Candidate {
        Candidate {
            id: id.parse().unwrap(),
            name: name.into(),
            district: district.parse().unwrap(),
            party: party.parse().unwrap(),
            status: if incumbent {
                CandidateStatus::Incumbent
            } else {
                CandidateStatus::New
            },
            previous_wins: if incumbent { 3 } else { 0 },
            dual_candidacy: false,
        }
    }

    fn reference() -> ReferenceSet {
        ReferenceSet {
            districts: vec![district("10_1", "north_kanto"), district("10_2", "north_kanto")],
            candidates: vec![
                candidate("c-a1", "Aoki", "10_1", "alpha", true),
                candidate("c-b1", "Baba", "10_1", "beta", false),
                candidate("c-a2", "Abe", "10_2", "alpha", false),
                candidate("c-b2", "Banno", "10_2", "beta", true),
            ],
            alignment: AlignmentTable::default(),
            block_seats: [("north_kanto".parse().unwrap(), 4)].into_iter().collect(),
        }
    }

    fn params() -> SimParams {
        SimParams {
            seed: 42,
            personas_per_district: 40,
            ..SimParams::default()
        }
    }

    async fn run_once(dir: &TempDir) -> RunArtifacts {
        let memory = MemoryStore::open(dir.path()).unwrap();
        let engine = SimulationEngine::new(reference(), params(), memory).unwrap();
        engine.run("baseline", vec!["test".into()]).await.unwrap()
    }

    #[tokio::test]
    async fn same_seed_reproduces_results() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let a = run_once(&dir_a).await;
        let b = run_once(&dir_b).await;

        assert_eq!(
            serde_json::to_value(&a.results).unwrap(),
            serde_json::to_value(&b.results).unwrap()
        );
        assert_eq!(
            serde_json::to_value(&a.record.summary).unwrap(),
            serde_json::to_value(&b.record.summary).unwrap()
        );
    }

    #[tokio::test]
    async fn summary_accounts_for_every_seat() {
        let dir = TempDir::new().unwrap();
        let artifacts = run_once(&dir).await;
        let summary = &artifacts.record.summary;

        assert_eq!(summary.districts_simulated, 2);
        assert!(summary.failed_districts.is_empty());
        let smd_total: u32 = summary.smd_seats.values().sum();
        assert_eq!(smd_total, 2);
        let pr_total: u32 = summary.pr_seats_total.values().sum();
        assert_eq!(pr_total, 4);
        let grand: u32 = summary.total_seats.values().sum();
        assert_eq!(grand, 6);
        assert!(summary.majority_party.is_none());
        assert!(summary.national_turnout > 0.0 && summary.national_turnout < 1.0);
    }

    #[tokio::test]
    async fn run_records_district_memory() {
        let dir = TempDir::new().unwrap();
        let memory = MemoryStore::open(dir.path()).unwrap();
        let engine = SimulationEngine::new(reference(), params(), memory).unwrap();
        engine.run("baseline", vec![]).await.unwrap();

        let memory = MemoryStore::open(dir.path()).unwrap();
        let history = memory.history(&"10_1".parse().unwrap(), 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].method, "rule");
        assert_eq!(history[0].total_personas, 40);
    }

    #[tokio::test]
    async fn uncontested_district_fails_without_stopping_the_run() {
        let mut reference = reference();
        let uncontested: DistrictId = "10_2".parse().unwrap();
        reference.candidates.retain(|c| c.district != uncontested);
        let dir = TempDir::new().unwrap();
        let memory = MemoryStore::open(dir.path()).unwrap();
        let engine = SimulationEngine::new(reference, params(), memory).unwrap();
        let artifacts = engine.run("baseline", vec![]).await.unwrap();

        let summary = &artifacts.record.summary;
        assert_eq!(summary.districts_simulated, 1);
        assert_eq!(summary.failed_districts, vec!["10_2".parse().unwrap()]);
        assert_eq!(artifacts.results[0].district, "10_1".parse().unwrap());
    }

    #[tokio::test]
    async fn empty_reference_is_rejected() {
        let dir = TempDir::new().unwrap();
        let memory = MemoryStore::open(dir.path()).unwrap();
        let err = SimulationEngine::new(ReferenceSet::default(), params(), memory);
        assert!(matches!(err, Err(EngineError::EmptyReference)));
    }
}
