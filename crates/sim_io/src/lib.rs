//! File-backed persistence and reference-data loading.
//!
//! Submodules own their formats; this file carries only the shared error
//! type. Artifacts are JSON (serde) or small CSV tables (`tabular`); hashes
//! of configuration snapshots come from `hasher`.

#![forbid(unsafe_code)]

use thiserror::Error;

use sim_core::ids::ExperimentId;

pub mod experiment;
pub mod hasher;
pub mod memory;
pub mod reference;
pub mod tabular;

#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors.
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON (de)serialization errors with the offending file.
    #[error("json error in {file}: {msg}")]
    Json { file: String, msg: String },

    /// Malformed CSV row or header.
    #[error("tabular error in {file}: {msg}")]
    Tabular { file: String, msg: String },

    /// The requested experiment has no directory under the store root.
    #[error("experiment not found: {0}")]
    ExperimentNotFound(ExperimentId),

    /// The experiment exists but the named artifact file is missing.
    #[error("artifact {name} not found for experiment {experiment}")]
    ArtifactNotFound {
        experiment: ExperimentId,
        name: String,
    },

    /// The named ground-truth result set has not been ingested.
    #[error("actual result set not found: {0}")]
    ActualNotFound(String),

    /// Reference data failed integrity checks.
    #[error("invalid reference data: {0}")]
    InvalidReference(String),

    /// Identifier parse failures surfaced while loading.
    #[error(transparent)]
    Core(#[from] sim_core::CoreError),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

/// Attach the file path to a serde_json error.
pub(crate) fn json_err(file: &std::path::Path, e: serde_json::Error) -> IoError {
    IoError::Json {
        file: file.display().to_string(),
        msg: e.to_string(),
    }
}
