//! `simelect` entry point: typed error mapping to stable exit codes, then
//! one handler per subcommand.

#![forbid(unsafe_code)]

mod args;

mod exitcodes {
    pub const OK: i32 = 0;
    /// Bad arguments or malformed input files.
    pub const USAGE: i32 = 2;
    /// The simulation itself failed.
    pub const RUN: i32 = 3;
    /// Store or filesystem trouble.
    pub const IO: i32 = 4;
}

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use args::{Cli, Command, RunArgs};
use sim_core::ids::ExperimentId;
use sim_core::params::SimParams;
use sim_engine::{EngineError, SimulationEngine, ValidationConfig};
use sim_io::experiment::{ExperimentStore, OutcomeRow, RunStatus};
use sim_io::memory::MemoryStore;
use sim_io::reference::{load_optional, load_reference, EconomicContext, PastElections};
use sim_io::IoError;
use sim_oracle::{HttpOracle, WeatherService};
use sim_report::compare::compare_outcomes;
use sim_report::consensus::{build_consensus, seat_spread};
use sim_report::format::{
    render_comparison, render_consensus, render_opinions, render_record, render_record_line,
    render_seat_spread,
};

#[derive(Debug)]
enum MainError {
    Usage(String),
    Run(String),
    Io(String),
}

impl std::fmt::Display for MainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MainError::Usage(m) | MainError::Run(m) | MainError::Io(m) => f.write_str(m),
        }
    }
}

impl From<IoError> for MainError {
    fn from(e: IoError) -> Self {
        match e {
            IoError::Json { .. } | IoError::Tabular { .. } | IoError::InvalidReference(_) => {
                MainError::Usage(e.to_string())
            }
            other => MainError::Io(other.to_string()),
        }
    }
}

impl From<EngineError> for MainError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Io(io) => MainError::from(io),
            other => MainError::Run(other.to_string()),
        }
    }
}

fn map_error(e: &MainError) -> i32 {
    match e {
        MainError::Usage(_) => exitcodes::USAGE,
        MainError::Run(_) => exitcodes::RUN,
        MainError::Io(_) => exitcodes::IO,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let rc = match dispatch(cli).await {
        Ok(()) => exitcodes::OK,
        Err(e) => {
            eprintln!("simelect: error: {e}");
            map_error(&e)
        }
    };
    ExitCode::from(rc as u8)
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), MainError> {
    let store = ExperimentStore::open(&cli.store)?;
    match cli.command {
        Command::Run(run) => cmd_run(&cli.store, &store, run).await,
        Command::List { tag } => cmd_list(&store, tag.as_deref()),
        Command::Show { id, opinions } => cmd_show(&store, &id, opinions),
        Command::Compare { a, b, actual } => cmd_compare(&store, &a, &b, actual),
        Command::Consensus { ids, tag } => cmd_consensus(&store, &ids, tag.as_deref()),
        Command::IngestActual { name, file } => cmd_ingest(&store, &name, &file),
        Command::ResetMemory => cmd_reset(&cli.store),
    }
}

/* ------------------------------- handlers ------------------------------- */

async fn cmd_run(
    root: &Path,
    store: &ExperimentStore,
    run: RunArgs,
) -> Result<(), MainError> {
    let mut params = match &run.params {
        Some(path) => read_json::<SimParams>(path)?,
        None => SimParams::default(),
    };
    if let Some(seed) = run.seed {
        params.seed = seed;
    }
    if let Some(personas) = run.personas {
        params.personas_per_district = personas;
    }
    if run.calibrate {
        params.calibration_enabled = true;
    }

    let reference = load_reference(&run.reference)?;
    let past = match &run.past_elections {
        Some(path) => load_optional::<PastElections>(path)?,
        None => None,
    };
    let economy = match &run.economy {
        Some(path) => load_optional::<EconomicContext>(path)?,
        None => None,
    };

    let memory = MemoryStore::open(root)?;
    let mut engine =
        SimulationEngine::new(reference, params, memory)?.with_history(past, economy);
    if let Some(path) = &run.validation {
        engine = engine.with_validation(read_json::<ValidationConfig>(path)?);
    }
    if run.weather_url.is_some() || run.weather_fallback_url.is_some() {
        engine = engine.with_weather(WeatherService::new(
            run.weather_url.clone(),
            run.weather_fallback_url.clone(),
        ));
    }
    if let Some(url) = &run.oracle_url {
        let key = std::env::var("SIMELECT_ORACLE_KEY").ok();
        let oracle = HttpOracle::new(url.clone(), run.oracle_model.clone(), key)
            .map_err(|e| MainError::Run(e.to_string()))?;
        engine = engine.with_oracle(Arc::new(oracle));
    }

    let artifacts = engine.run(&run.description, run.tags).await?;
    store.save(&artifacts.record, &artifacts.results, &artifacts.decisions)?;
    print!("{}", render_record(&artifacts.record));

    if artifacts.record.status == RunStatus::Failed {
        return Err(MainError::Run("no district produced a result".to_string()));
    }
    Ok(())
}

fn cmd_list(store: &ExperimentStore, tag: Option<&str>) -> Result<(), MainError> {
    match tag {
        Some(tag) => {
            for record in store.records_with_tag(tag)? {
                println!("{}", render_record_line(&record));
            }
        }
        None => {
            for id in store.list()? {
                let record = store.load_record(&id)?;
                println!("{}", render_record_line(&record));
            }
        }
    }
    Ok(())
}

fn cmd_show(store: &ExperimentStore, id: &str, opinions: bool) -> Result<(), MainError> {
    let id = parse_id(id)?;
    let record = store.load_record(&id)?;
    print!("{}", render_record(&record));
    if opinions {
        print!("{}", render_opinions(&store.load_opinions(&id)?, 10));
    }
    Ok(())
}

fn cmd_compare(
    store: &ExperimentStore,
    a: &str,
    b: &str,
    actual: bool,
) -> Result<(), MainError> {
    let id_a = parse_id(a)?;
    let outcomes_a = store.load_outcomes(&id_a)?;
    let outcomes_b = if actual {
        store.load_actual(b)?
    } else {
        store.load_outcomes(&parse_id(b)?)?
    };
    let report = compare_outcomes(&outcomes_a, &outcomes_b);
    print!("{}", render_comparison(a, b, &report));
    Ok(())
}

fn cmd_consensus(
    store: &ExperimentStore,
    ids: &[String],
    tag: Option<&str>,
) -> Result<(), MainError> {
    let mut selected: Vec<ExperimentId> = Vec::new();
    for id in ids {
        selected.push(parse_id(id)?);
    }
    if let Some(tag) = tag {
        for record in store.records_with_tag(tag)? {
            selected.push(record.id);
        }
    }
    selected.sort();
    selected.dedup();
    if selected.len() < 2 {
        return Err(MainError::Usage(
            "consensus needs at least two experiments (ids or --tag)".to_string(),
        ));
    }

    let mut runs = Vec::with_capacity(selected.len());
    let mut records = Vec::with_capacity(selected.len());
    for id in &selected {
        runs.push(store.load_outcomes(id)?);
        records.push(store.load_record(id)?);
    }
    print!("{}", render_consensus(&build_consensus(&runs)));
    let summaries: Vec<_> = records.iter().map(|r| &r.summary).collect();
    print!("{}", render_seat_spread(&seat_spread(&summaries)));
    Ok(())
}

fn cmd_ingest(store: &ExperimentStore, name: &str, file: &Path) -> Result<(), MainError> {
    let rows: Vec<OutcomeRow> = read_json(file)?;
    if rows.is_empty() {
        return Err(MainError::Usage(format!(
            "{}: no outcome rows",
            file.display()
        )));
    }
    let path = store.ingest_actual(name, &rows)?;
    println!(
        "ingested {} districts as {name} ({})",
        rows.len(),
        path.display()
    );
    Ok(())
}

fn cmd_reset(root: &Path) -> Result<(), MainError> {
    MemoryStore::open(root)?.reset()?;
    println!("district memory cleared");
    Ok(())
}

/* -------------------------------- helpers -------------------------------- */

fn parse_id(raw: &str) -> Result<ExperimentId, MainError> {
    raw.parse::<ExperimentId>()
        .map_err(|e| MainError::Usage(format!("{raw}: {e}")))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, MainError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| MainError::Io(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| MainError::Usage(format!("{}: {e}", path.display())))
}
