//! Run orchestration.
//!
//! Drives the per-district pipeline (weather, sampling, scoring, optional
//! oracle escalation, calibration, aggregation), rolls districts up into
//! national seat totals, runs the validation battery, and records the run
//! in the experiment store and district memory.

#![forbid(unsafe_code)]

pub mod engine;
pub mod validate;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Io(#[from] sim_io::IoError),

    #[error(transparent)]
    Core(#[from] sim_core::CoreError),

    #[error("seat allocation failed: {0}")]
    Allocation(#[from] sim_algo::AlgoError),

    #[error("reference set has no districts")]
    EmptyReference,

    #[error("district {0} has no candidates")]
    NoCandidates(sim_core::ids::DistrictId),
}

pub use engine::{RunArtifacts, SimulationEngine};
pub use validate::{validate_run, ValidationConfig};
