//! External decision oracle: client abstraction, structured batch protocol,
//! concurrent dispatcher with retries and fallback, and the weather feed.
//!
//! The oracle is a black box that accepts a structured prompt and returns one
//! structured decision per persona. Everything here is about getting batches
//! to it reliably and turning whatever comes back into terminal decisions.

#![forbid(unsafe_code)]

pub mod client;
pub mod dispatcher;
pub mod prompt;
pub mod protocol;
pub mod weather;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    /// Endpoint refused or is not configured.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Non-success HTTP status.
    #[error("oracle request failed with status {status}")]
    RequestFailed { status: u16 },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Response did not contain a parseable decision array.
    #[error("unparseable oracle response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        OracleError::Network(e.to_string())
    }
}

pub use client::{DecisionOracle, HttpOracle, MockOracle};
pub use dispatcher::dispatch_district;
pub use weather::WeatherService;
