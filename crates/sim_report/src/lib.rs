//! Reporting: run-versus-run comparison, multi-seed consensus, and the
//! plain-text renderings the CLI prints.
//!
//! Everything here is pure computation over `OutcomeRow` sets, so a
//! simulated run, another simulated run, and ingested ground truth all
//! compare through the same code path.

#![forbid(unsafe_code)]

pub mod compare;
pub mod consensus;
pub mod format;

pub use compare::{compare_outcomes, ComparisonReport, SeatDiff};
pub use consensus::{build_consensus, seat_spread, ConsensusEntry, PartySeatStats, SeatRating};
