//! Argument surface.
//!
//! Every subcommand shares one store root; the `run` flags are thin
//! overrides over a parameter file, so a run is reproducible from the
//! file plus the recorded overrides alone.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "simelect",
    disable_help_subcommand = true,
    about = "Persona-based mixed-member election simulator"
)]
pub struct Cli {
    /// Experiment store root; district memory lives under it as well.
    #[arg(long, global = true, default_value = "experiments")]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate one full election and record it as an experiment.
    Run(RunArgs),
    /// List recorded experiments, newest-id last.
    List {
        /// Only experiments carrying this tag.
        #[arg(long)]
        tag: Option<String>,
    },
    /// Print one experiment's full report.
    Show {
        /// Experiment id, e.g. sim_20260830_120000_seed42.
        id: String,
        /// Also print voter rationales grouped by supported party.
        #[arg(long)]
        opinions: bool,
    },
    /// Compare two experiments, or an experiment against ingested results.
    Compare {
        /// Experiment id for side A.
        a: String,
        /// Experiment id for side B, or an ingested-actual name with --actual.
        b: String,
        /// Treat B as an ingested actual-result name.
        #[arg(long)]
        actual: bool,
    },
    /// Fold several experiments into a per-district consensus table.
    Consensus {
        /// Experiment ids; may be empty when --tag selects them instead.
        ids: Vec<String>,
        /// Add every experiment carrying this tag.
        #[arg(long)]
        tag: Option<String>,
    },
    /// Store real election results for later comparison.
    IngestActual {
        /// Name the results are stored under.
        name: String,
        /// JSON file with an array of outcome rows.
        file: PathBuf,
    },
    /// Delete all accumulated district memory.
    ResetMemory,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Reference set JSON: districts, candidates, alignment, block seats.
    #[arg(long)]
    pub reference: PathBuf,

    /// Parameter file (JSON `SimParams`); defaults apply when omitted.
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Override the parameter file's seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override personas sampled per district.
    #[arg(long)]
    pub personas: Option<u32>,

    /// Free-text description stored with the experiment.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Tags stored with the experiment; repeatable.
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Enable post-hoc calibration toward baseline support.
    #[arg(long)]
    pub calibrate: bool,

    /// Decision-oracle endpoint; high-swing personas escalate when set.
    /// The API key is read from SIMELECT_ORACLE_KEY.
    #[arg(long)]
    pub oracle_url: Option<String>,

    /// Model name sent to the oracle endpoint.
    #[arg(long, default_value = "gpt-4o-mini")]
    pub oracle_model: String,

    /// Primary weather endpoint; static climatology applies when omitted.
    #[arg(long)]
    pub weather_url: Option<String>,

    /// Secondary weather endpoint tried after the primary.
    #[arg(long)]
    pub weather_fallback_url: Option<String>,

    /// Past real election results (JSON), injected into oracle prompts.
    #[arg(long)]
    pub past_elections: Option<PathBuf>,

    /// Current economic indicators (JSON), injected into oracle prompts.
    #[arg(long)]
    pub economy: Option<PathBuf>,

    /// Validation battery config (JSON); built-in bands apply when omitted.
    #[arg(long)]
    pub validation: Option<PathBuf>,
}
