//! Command line front-end for `process_simulation`
//!
//! Calibrates a process graph with an event log and prints the simulated durations.
//!
//! ```bash
//! # Durations are mined from the log
//! binary --graph model.json --log log.csv
//!
//! # Explicit durations, 1000 runs, JSON output
//! binary --graph model.json --log log.csv --durations durations.json --runs 1000 --json
//!
//! # Graph, durations, and options bundled in a scenario file
//! binary --scenario scenario.json --log log.csv
//! ```

use std::{fs::File, io::BufReader, path::PathBuf, process::ExitCode, time::Instant};

use clap::Parser;
use process_simulation::{
    analysis::case_centric::significant_durations::SignificantDurationOptions,
    core::event_data::case_centric::{CsvImportError, CsvImportOptions},
    core::process_models::case_centric::process_graph::{ProcessGraphDefinition, ProcessGraphError},
    import_csv_path,
    simulation::DurationError,
    simulate_process, DurationTable, ProcessGraph, SimulationError, SimulationOptions,
    SimulationScenario, SimulationSummary,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log-calibrated Monte-Carlo simulation of process graphs
#[derive(Parser, Debug)]
#[command(name = "binary")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Process graph definition (JSON)
    #[arg(short, long, required_unless_present = "scenario", conflicts_with = "scenario")]
    graph: Option<PathBuf>,

    /// Scenario with graph, durations, and options (JSON)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Event log (CSV with case id, activity, and timestamp columns)
    #[arg(short, long)]
    log: PathBuf,

    /// Duration (hours) per activity (JSON object); completes and overrides mined durations
    #[arg(short, long)]
    durations: Option<PathBuf>,

    /// Number of simulated runs
    #[arg(short, long)]
    runs: Option<usize>,

    /// Seed of the random decisions
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Graph(#[from] ProcessGraphError),
    #[error(transparent)]
    Log(#[from] CsvImportError),
    #[error(transparent)]
    Durations(#[from] DurationError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("no process graph given")]
    MissingGraph,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_scenario(cli: &Cli) -> Result<SimulationScenario, CliError> {
    let mut scenario = match (&cli.scenario, &cli.graph) {
        (Some(path), _) => {
            serde_json::from_reader(BufReader::new(File::open(path)?))?
        }
        (None, Some(path)) => SimulationScenario {
            graph: ProcessGraphDefinition::from(&ProcessGraph::import_json_path(path)?),
            durations: None,
            significant_durations: SignificantDurationOptions::default(),
            options: SimulationOptions::default(),
        },
        (None, None) => return Err(CliError::MissingGraph),
    };
    if let Some(path) = &cli.durations {
        scenario.durations = Some(DurationTable::import_json_path(path)?);
    }
    if let Some(runs) = cli.runs {
        scenario.options.num_runs = runs;
    }
    if let Some(seed) = cli.seed {
        scenario.options.seed = seed;
    }
    Ok(scenario)
}

fn print_summary(summary: &SimulationSummary) {
    println!(
        "{:>14} {:>14} {:>10}  Trace",
        "Duration (h)", "Adjusted (h)", "Share (%)"
    );
    for group in &summary.groups {
        println!(
            "{:>14.2} {:>14.2} {:>10.2}  {}",
            group.duration,
            group.adjusted_duration,
            group.percentage,
            group.trace.join(" -> ")
        );
    }
    println!();
    println!("Runs:                   {}", summary.num_runs());
    println!("Mean duration (h):      {:.2}", summary.mean_duration);
    println!("Mean adjusted duration: {:.2}", summary.mean_adjusted_duration);
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let scenario = load_scenario(cli)?;
    let graph = ProcessGraph::try_from(scenario.graph.clone())?;

    let now = Instant::now();
    let log = import_csv_path(&cli.log, &CsvImportOptions::default())?;
    info!(
        cases = log.traces.len(),
        events = log.num_events(),
        elapsed = ?now.elapsed(),
        "imported event log"
    );

    let durations = scenario.durations_for(&log);
    durations.validate_for(&graph)?;

    let now = Instant::now();
    let summary = simulate_process(&graph, &log, &durations, &scenario.options)?;
    info!(elapsed = ?now.elapsed(), "simulated process");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
