//! District memory: episodic run outcomes and calibration signals, folded
//! into contextual text for later oracle prompts.
//!
//! One JSON file per district under `<root>/memory/`. Episodes append at run
//! completion; trends are computed on read from the most recent 20 episodes,
//! so there is no separate trend table to keep consistent. Snapshots are
//! replaced by temp-file-and-rename, so a reader overlapping a writer from
//! another run sees either the old file or the new one, never a partial
//! write.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use sim_core::entities::CalibrationSignal;
use sim_core::ids::{DistrictId, ExperimentId, PartyId};

use crate::reference::{EconomicContext, PastElections};
use crate::{IoError, IoResult, json_err};

const TREND_WINDOW: usize = 20;

/// One run's outcome for one district.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryEpisode {
    pub experiment: ExperimentId,
    pub timestamp: DateTime<Utc>,
    pub total_personas: u32,
    pub turnout_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_party: Option<PartyId>,
    pub party_vote_shares: BTreeMap<PartyId, f64>,
    pub method: String,
    pub calibration_strength: f64,
}

/// A persisted calibration signal with its provenance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredSignal {
    pub experiment: ExperimentId,
    pub timestamp: DateTime<Utc>,
    pub party: PartyId,
    pub target_share: f64,
    pub predicted_share: f64,
    pub correction: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct DistrictMemory {
    episodes: Vec<MemoryEpisode>,
    signals: Vec<StoredSignal>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Rolling per-party statistics over the trend window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrendRecord {
    pub party: PartyId,
    pub run_count: u32,
    pub avg_vote_share: f64,
    pub stddev_vote_share: f64,
    pub direction: TrendDirection,
}

pub struct MemoryStore {
    dir: PathBuf,
}

impl MemoryStore {
    pub fn open(root: impl Into<PathBuf>) -> IoResult<Self> {
        let dir = root.into().join("memory");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_of(&self, district: &DistrictId) -> PathBuf {
        self.dir.join(format!("{district}.json"))
    }

    fn load(&self, district: &DistrictId) -> IoResult<DistrictMemory> {
        let path = self.path_of(district);
        if !path.is_file() {
            return Ok(DistrictMemory::default());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| json_err(&path, e))
    }

    fn persist(&self, district: &DistrictId, memory: &DistrictMemory) -> IoResult<()> {
        let path = self.path_of(district);
        let bytes = serde_json::to_vec_pretty(memory).map_err(|e| json_err(&path, e))?;
        // Write the full snapshot beside the target, then rename over it, so
        // a concurrent reader never opens a half-written file.
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path)
            .map_err(|e| IoError::Path(e.to_string()))?;
        Ok(())
    }

    /// Append one run's episode and its calibration signals.
    pub fn record_run(
        &self,
        district: &DistrictId,
        episode: MemoryEpisode,
        signals: &[CalibrationSignal],
    ) -> IoResult<()> {
        let mut memory = self.load(district)?;
        let experiment = episode.experiment.clone();
        let timestamp = episode.timestamp;
        memory.episodes.push(episode);
        for s in signals {
            memory.signals.push(StoredSignal {
                experiment: experiment.clone(),
                timestamp,
                party: s.party.clone(),
                target_share: s.target_share,
                predicted_share: s.predicted_share,
                correction: s.correction,
            });
        }
        self.persist(district, &memory)?;
        debug!(%district, %experiment, signals = signals.len(), "memory episode recorded");
        Ok(())
    }

    /// Most recent episodes, newest first.
    pub fn history(&self, district: &DistrictId, limit: usize) -> IoResult<Vec<MemoryEpisode>> {
        let memory = self.load(district)?;
        Ok(memory.episodes.into_iter().rev().take(limit).collect())
    }

    /// Per-party rolling statistics over the last `TREND_WINDOW` episodes.
    /// Direction compares the recent half against the older half; moves
    /// within ±0.02 count as stable.
    pub fn trends(&self, district: &DistrictId) -> IoResult<Vec<TrendRecord>> {
        let memory = self.load(district)?;
        // Newest first, matching the read order of `history`.
        let mut shares: BTreeMap<PartyId, Vec<f64>> = BTreeMap::new();
        for ep in memory.episodes.iter().rev().take(TREND_WINDOW) {
            for (party, share) in &ep.party_vote_shares {
                shares.entry(party.clone()).or_default().push(*share);
            }
        }

        let mut records = Vec::new();
        for (party, xs) in shares {
            let n = xs.len();
            let avg = xs.iter().sum::<f64>() / n as f64;
            let stddev = if n > 1 {
                (xs.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n as f64).sqrt()
            } else {
                0.0
            };
            let direction = if n >= 4 {
                let half = n / 2;
                let recent = xs[..half].iter().sum::<f64>() / half as f64;
                let older = xs[half..].iter().sum::<f64>() / (n - half) as f64;
                if recent - older > 0.02 {
                    TrendDirection::Increasing
                } else if older - recent > 0.02 {
                    TrendDirection::Decreasing
                } else {
                    TrendDirection::Stable
                }
            } else {
                TrendDirection::Stable
            };
            records.push(TrendRecord {
                party,
                run_count: n as u32,
                avg_vote_share: avg,
                stddev_vote_share: stddev,
                direction,
            });
        }
        Ok(records)
    }

    /// Average correction per party across all stored signals.
    pub fn calibration_summary(
        &self,
        district: &DistrictId,
    ) -> IoResult<Vec<(PartyId, f64, u32)>> {
        let memory = self.load(district)?;
        let mut acc: BTreeMap<PartyId, (f64, u32)> = BTreeMap::new();
        for s in &memory.signals {
            let e = acc.entry(s.party.clone()).or_insert((0.0, 0));
            e.0 += s.correction;
            e.1 += 1;
        }
        Ok(acc
            .into_iter()
            .map(|(p, (sum, n))| (p, sum / n as f64, n))
            .collect())
    }

    /// Render the memory context injected into oracle prompts: real past
    /// elections, economic indicators, recent simulated episodes with their
    /// top-3 shares, and accumulated calibration signals.
    pub fn context_for_prompt(
        &self,
        district: &DistrictId,
        past: Option<&PastElections>,
        econ: Option<&EconomicContext>,
    ) -> IoResult<String> {
        let mut sections: Vec<String> = Vec::new();

        if let Some(past) = past {
            let mut lines = Vec::new();
            for e in &past.elections {
                let mut seats: Vec<(&String, &u32)> = e.national_seats.iter().collect();
                seats.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
                let seat_str = seats
                    .iter()
                    .take(5)
                    .map(|(p, s)| format!("{p} {s}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let turnout = e
                    .national_turnout
                    .map(|t| format!(", turnout {:.1}%", t * 100.0))
                    .unwrap_or_default();
                let trend = e
                    .key_trends
                    .first()
                    .map(|t| format!(" ({t})"))
                    .unwrap_or_default();
                lines.push(format!("- {} ({}): seats {seat_str}{turnout}{trend}", e.kind, e.date));
            }
            if !lines.is_empty() {
                sections.push(format!("## Past election results (actual)\n{}", lines.join("\n")));
            }
        }

        if let Some(econ) = econ {
            let mut lines = Vec::new();
            if let (Some(gdp), Some(cpi), Some(unemp)) = (
                econ.gdp_growth_rate,
                econ.cpi_year_over_year,
                econ.unemployment_rate,
            ) {
                lines.push(format!(
                    "- GDP growth {:+.1}%, CPI {:+.1}% YoY, unemployment {:.1}%",
                    gdp * 100.0,
                    cpi * 100.0,
                    unemp * 100.0
                ));
            }
            if let Some(rw) = econ.real_wage_change {
                lines.push(format!("- Real wages {:+.1}%", rw * 100.0));
            }
            if let Some(labor) = &econ.labor_market {
                lines.push(format!("- {labor}"));
            }
            if let Some(sentiment) = &econ.consumer_sentiment {
                lines.push(format!("- Consumer sentiment: {sentiment}"));
            }
            if !lines.is_empty() {
                sections.push(format!("## Current economic conditions\n{}", lines.join("\n")));
            }
        }

        let history = self.history(district, 3)?;
        if !history.is_empty() {
            let mut lines = vec![format!(
                "Last {} simulated outcomes for this district:",
                history.len()
            )];
            for h in &history {
                let mut shares: Vec<(&PartyId, &f64)> = h.party_vote_shares.iter().collect();
                shares.sort_by(|a, b| {
                    b.1.partial_cmp(a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.0.cmp(b.0))
                });
                let share_str = shares
                    .iter()
                    .take(3)
                    .map(|(p, s)| format!("{p} {:.1}%", **s * 100.0))
                    .collect::<Vec<_>>()
                    .join(", ");
                let winner = h
                    .winner_party
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "none".to_string());
                lines.push(format!(
                    "  - {}: winner {winner}, shares {share_str}, turnout {:.1}%",
                    h.experiment,
                    h.turnout_rate * 100.0
                ));
            }
            sections.push(format!("## Prior simulation memory\n{}", lines.join("\n")));
        }

        let calibrations = self.calibration_summary(district)?;
        if !calibrations.is_empty() {
            let mut lines = vec!["Calibration signals:".to_string()];
            for (party, avg_correction, count) in calibrations {
                let tendency = if avg_correction < 0.0 {
                    "over-predicted"
                } else {
                    "under-predicted"
                };
                lines.push(format!(
                    "  - {party}: {tendency} by {:.1}% on average ({count} observations)",
                    avg_correction.abs() * 100.0
                ));
            }
            sections.push(lines.join("\n"));
        }

        Ok(sections.join("\n\n"))
    }

    /// Delete all stored memory.
    pub fn reset(&self) -> IoResult<()> {
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|e| e == "json") {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(seed: u64, alpha: f64, beta: f64) -> MemoryEpisode {
        let mut shares = BTreeMap::new();
        shares.insert("alpha".parse().unwrap(), alpha);
        shares.insert("beta".parse().unwrap(), beta);
        MemoryEpisode {
            experiment: format!("sim_20260101_{:06}_seed{seed}", seed)
                .parse()
                .unwrap(),
            timestamp: Utc::now(),
            total_personas: 100,
            turnout_rate: 0.55,
            winner_party: Some("alpha".parse().unwrap()),
            party_vote_shares: shares,
            method: "rule".into(),
            calibration_strength: 0.3,
        }
    }

    #[test]
    fn episodes_accumulate_and_history_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        let district: DistrictId = "01_1".parse().unwrap();
        for seed in 1..=5 {
            store
                .record_run(&district, episode(seed, 0.4, 0.3), &[])
                .unwrap();
        }
        let history = store.history(&district, 3).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].experiment.seed(), Some(5));
    }

    #[test]
    fn trend_direction_detects_growth() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        let district: DistrictId = "01_1".parse().unwrap();
        // Older runs at 0.30, recent runs at 0.40.
        for (seed, share) in [(1, 0.30), (2, 0.30), (3, 0.40), (4, 0.40)] {
            store
                .record_run(&district, episode(seed, share, 0.2), &[])
                .unwrap();
        }
        let trends = store.trends(&district).unwrap();
        let alpha = trends
            .iter()
            .find(|t| t.party.as_str() == "alpha")
            .unwrap();
        assert_eq!(alpha.direction, TrendDirection::Increasing);
        assert_eq!(alpha.run_count, 4);
        assert!((alpha.avg_vote_share - 0.35).abs() < 1e-12);
        let beta = trends.iter().find(|t| t.party.as_str() == "beta").unwrap();
        assert_eq!(beta.direction, TrendDirection::Stable);
    }

    #[test]
    fn calibration_signals_average() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        let district: DistrictId = "01_1".parse().unwrap();
        let signals = vec![
            CalibrationSignal {
                district: district.clone(),
                party: "alpha".parse().unwrap(),
                target_share: 0.4,
                predicted_share: 0.5,
                correction: -0.1,
            },
            CalibrationSignal {
                district: district.clone(),
                party: "alpha".parse().unwrap(),
                target_share: 0.4,
                predicted_share: 0.6,
                correction: -0.2,
            },
        ];
        store
            .record_run(&district, episode(1, 0.5, 0.2), &signals)
            .unwrap();
        let summary = store.calibration_summary(&district).unwrap();
        assert_eq!(summary.len(), 1);
        let (_, avg, n) = &summary[0];
        assert!((avg + 0.15).abs() < 1e-12);
        assert_eq!(*n, 2);
    }

    #[test]
    fn context_mentions_history_and_signals() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        let district: DistrictId = "01_1".parse().unwrap();
        store
            .record_run(
                &district,
                episode(1, 0.45, 0.25),
                &[CalibrationSignal {
                    district: district.clone(),
                    party: "alpha".parse().unwrap(),
                    target_share: 0.4,
                    predicted_share: 0.45,
                    correction: -0.05,
                }],
            )
            .unwrap();
        let text = store.context_for_prompt(&district, None, None).unwrap();
        assert!(text.contains("Prior simulation memory"));
        assert!(text.contains("alpha"));
        assert!(text.contains("over-predicted"));
    }

    #[test]
    fn reader_overlapping_writer_always_gets_a_complete_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let district: DistrictId = "01_1".parse().unwrap();

        let writer_root = root.clone();
        let writer_district = district.clone();
        let writer = std::thread::spawn(move || {
            let store = MemoryStore::open(writer_root).unwrap();
            for seed in 1..=40 {
                store
                    .record_run(&writer_district, episode(seed, 0.4, 0.3), &[])
                    .unwrap();
            }
        });

        // Every read while the writer runs must parse; stale is fine,
        // torn is not.
        let store = MemoryStore::open(&root).unwrap();
        while !writer.is_finished() {
            let history = store.history(&district, 50).unwrap();
            assert!(history.len() <= 40);
        }
        writer.join().unwrap();
        assert_eq!(store.history(&district, 50).unwrap().len(), 40);

        // No temp files left behind after the renames.
        let stray: Vec<_> = fs::read_dir(root.join("memory"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n != "01_1.json")
            .collect();
        assert!(stray.is_empty(), "unexpected files: {stray:?}");
    }

    #[test]
    fn reset_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path()).unwrap();
        let district: DistrictId = "01_1".parse().unwrap();
        store
            .record_run(&district, episode(1, 0.4, 0.3), &[])
            .unwrap();
        store.reset().unwrap();
        assert!(store.history(&district, 5).unwrap().is_empty());
    }
}
