//! Pure, deterministic simulation algorithms.
//!
//! Everything here is synchronous and side-effect free: persona sampling,
//! the rule-based decision model, distribution calibration, district
//! tallying, and highest-averages seat allocation. All randomness enters
//! through an explicit `SimRng`; all map iteration uses `BTreeMap` so a
//! given seed always produces the same bytes.

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod allocation;
pub mod calibrate;
pub mod decide;
pub mod sampler;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlgoError {
    /// Seat allocation was asked to run with no vote-bearing parties.
    #[error("no parties with votes to allocate seats over")]
    NoEligibleParties,
}
