//! sim_core — Core types, enumerated domains, and deterministic RNG.
//!
//! This crate is **I/O-free**. It defines the stable types shared across the
//! engine (`sim_io`, `sim_algo`, `sim_oracle`, `sim_engine`, `sim_report`,
//! `sim_cli`):
//!
//! - Identifier newtypes: `DistrictId`, `PartyId`, `CandidateId`,
//!   `PersonaId`, `ExperimentId`
//! - Reference entities (`District`, `Candidate`) and run-scoped entities
//!   (`Persona`, `VoteDecision`, `DistrictResult`)
//! - Enumerated demographic/political domains (no stringly-typed tables)
//! - Seeded RNG (ChaCha20) with per-district sub-seed derivation
//! - The full run-parameter set (`SimParams`)

#![forbid(unsafe_code)]

pub mod entities;
pub mod ids;
pub mod params;
pub mod rng;

use thiserror::Error;

/// Minimal error set for core-domain validation and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("domain out of range: {0}")]
    DomainOutOfRange(&'static str),
    #[error("empty choice set")]
    EmptyChoiceSet,
}

pub mod prelude {
    pub use crate::entities::*;
    pub use crate::ids::*;
    pub use crate::params::{FactorWeights, SimParams};
    pub use crate::rng::SimRng;
    pub use crate::CoreError;
}
