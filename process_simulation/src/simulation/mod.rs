//! Monte-Carlo simulation of process graphs
//!
//! A process graph is calibrated with branching probabilities mined from an event log
//! ([`estimate_gateway_probabilities`]) and durations per activity ([`DurationTable`]). It is
//! then replayed many times ([`SimulationModel`], [`run_monte_carlo`]) and the runs are
//! aggregated into a [`SimulationSummary`].
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::case_centric::significant_durations::{
        get_significant_durations, SignificantDurationOptions,
    },
    core::{
        event_data::case_centric::EventLogActivityProjection,
        process_models::case_centric::process_graph::{ProcessGraphDefinition, ProcessGraphError},
    },
    discovery::case_centric::branching::estimate_gateway_probabilities,
    EventLog, ProcessGraph,
};

/// Activity durations and their estimation boundary
pub mod durations;
/// Discrete-event simulation of single runs
pub mod engine;
/// Monte-Carlo driver and result aggregation
pub mod monte_carlo;

#[doc(inline)]
pub use durations::{DurationError, DurationEstimator, DurationTable};
#[doc(inline)]
pub use engine::{SimulationModel, SimulationRun};
#[doc(inline)]
pub use monte_carlo::{run_monte_carlo, summarize, DurationGroup, SimulationSummary};

///
/// Error encountered during simulation
///
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// An activity has no duration
    #[error("no duration for activity `{0}`")]
    MissingDuration(String),
    /// Durations are missing or invalid
    #[error(transparent)]
    Durations(#[from] DurationError),
    /// The process graph can not be prepared for simulation
    #[error(transparent)]
    Graph(#[from] ProcessGraphError),
    /// A node that must be left has no outgoing arc
    #[error("node `{0}` has no outgoing arc")]
    NoOutgoingArc(String),
    /// Branching probabilities can not be sampled
    #[error("invalid branching probabilities: {0}")]
    Sampling(String),
    /// A run did not terminate within the configured number of steps
    #[error("simulation run exceeded {limit} steps")]
    StepLimitExceeded {
        /// Configured step limit
        limit: usize,
    },
}

const DEFAULT_NUM_RUNS: usize = 10_000;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_MAX_STEPS_PER_RUN: usize = 100_000;

/// Options for [`simulate_process`] and [`run_monte_carlo`]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SimulationOptions {
    /// Number of simulated runs
    pub num_runs: usize,
    /// Seed for the random decisions of all runs
    pub seed: u64,
    /// Record a textual log of decisions for every run
    pub record_debug_log: bool,
    /// Abort a run after this many simulation steps
    pub max_steps_per_run: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            num_runs: DEFAULT_NUM_RUNS,
            seed: DEFAULT_SEED,
            record_debug_log: false,
            max_steps_per_run: DEFAULT_MAX_STEPS_PER_RUN,
        }
    }
}

///
/// Simulate a process graph calibrated with an event log
///
/// Resolves gateway directions, detects activities absent from the log, estimates branching
/// probabilities, checks that every activity has a duration, and aggregates
/// [`SimulationOptions::num_runs`] runs.
pub fn simulate_process(
    graph: &ProcessGraph,
    log: &EventLog,
    durations: &DurationTable,
    options: &SimulationOptions,
) -> Result<SimulationSummary, SimulationError> {
    let mut graph = graph.clone();
    graph.resolve_gateway_directions()?;
    let new_activities = graph.new_activities(&log.activities());
    let projection = EventLogActivityProjection::from(log);
    let probabilities = estimate_gateway_probabilities(&graph, &projection, &new_activities);
    durations.validate_for(&graph)?;
    let model = SimulationModel::new(&graph, probabilities, durations, new_activities)?;
    let runs = run_monte_carlo(&model, options)?;
    Ok(summarize(runs))
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
///
/// Everything needed to simulate a process besides the event log
///
/// Durations are mined from the log with [`get_significant_durations`]. Given durations are laid
/// over the mined ones: they fill activities without a significant duration and replace mined
/// values.
pub struct SimulationScenario {
    /// Process graph
    pub graph: ProcessGraphDefinition,
    /// Duration (hours) per activity, taking precedence over mined durations
    #[serde(default)]
    pub durations: Option<DurationTable>,
    /// Options used when durations are mined from the log
    #[serde(default)]
    pub significant_durations: SignificantDurationOptions,
    /// Simulation options
    #[serde(default)]
    pub options: SimulationOptions,
}

impl SimulationScenario {
    /// Durations mined from `log`, overlaid with the durations of the scenario
    pub fn durations_for(&self, log: &EventLog) -> DurationTable {
        let mut durations =
            get_significant_durations(log, &self.significant_durations).to_duration_table();
        if let Some(given) = &self.durations {
            durations.overlay(given);
        }
        durations
    }

    /// Simulate the scenario with branching probabilities from `log`
    pub fn simulate(&self, log: &EventLog) -> Result<SimulationSummary, SimulationError> {
        let graph = ProcessGraph::try_from(self.graph.clone())?;
        simulate_process(&graph, log, &self.durations_for(log), &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::event_data::case_centric::{import_csv_path, CsvImportOptions},
        event_log,
        utils::test_utils::get_test_data_path,
    };

    fn fines() -> (ProcessGraph, EventLog) {
        let data = get_test_data_path();
        let graph = ProcessGraph::import_json_path(data.join("json").join("fines.json")).unwrap();
        let log =
            import_csv_path(data.join("csv").join("fines.csv"), &CsvImportOptions::default())
                .unwrap();
        (graph, log)
    }

    #[test]
    fn options_defaults() {
        let options: SimulationOptions = serde_json::from_str(r#"{"num_runs": 10}"#).unwrap();
        assert_eq!(options.num_runs, 10);
        assert_eq!(options.seed, 42);
        assert!(!options.record_debug_log);
    }

    #[test]
    fn missing_durations_are_reported_before_simulation() {
        let (graph, log) = fines();
        let res = simulate_process(&graph, &log, &DurationTable::new(), &Default::default());
        assert!(matches!(
            res,
            Err(SimulationError::Durations(DurationError::MissingDuration(missing))) if missing.len() == 4
        ));
    }

    #[test]
    fn ambiguous_gateway_is_reported() {
        let mut graph = ProcessGraph::new();
        let s = graph.add_start_event("start").unwrap();
        let g = graph
            .add_exclusive_gateway("g", Default::default())
            .unwrap();
        let e = graph.add_end_event("end").unwrap();
        graph.add_arc(s, g);
        graph.add_arc(g, e);
        let res = simulate_process(
            &graph,
            &event_log!(["A"]),
            &DurationTable::new(),
            &Default::default(),
        );
        assert!(matches!(
            res,
            Err(SimulationError::Graph(
                ProcessGraphError::AmbiguousGatewayDirection { .. }
            ))
        ));
    }

    #[test]
    fn fines_scenario() {
        let (graph, log) = fines();
        let mut durations = DurationTable::new();
        for (activity, hours) in [
            ("Create Fine", 1.0),
            ("Send Fine", 24.0),
            ("Payment", 2.0),
            ("Send for Credit Collection", 48.0),
        ] {
            durations.insert(activity, hours).unwrap();
        }
        let scenario = SimulationScenario {
            graph: ProcessGraphDefinition::from(&graph),
            durations: Some(durations),
            significant_durations: Default::default(),
            options: SimulationOptions {
                num_runs: 1_000,
                ..Default::default()
            },
        };
        let summary = scenario.simulate(&log).unwrap();
        assert_eq!(summary.num_runs(), 1_000);
        // Create Fine -> Payment, Create Fine -> Send Fine -> Payment, ... -> Credit Collection
        assert_eq!(summary.groups.len(), 3);
        let total: f64 = summary.groups.iter().map(|g| g.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
        for group in &summary.groups {
            assert_eq!(group.trace[0], "Create Fine");
            assert_eq!(group.adjusted_duration, group.duration - 1.0);
        }
        let direct = summary
            .groups
            .iter()
            .find(|g| g.trace == vec!["Create Fine", "Payment"])
            .unwrap();
        assert_eq!(direct.duration, 3.0);
        assert!((direct.percentage - 40.0).abs() < 6.0);
    }

    #[test]
    fn scenario_mines_missing_durations() {
        let (graph, log) = fines();
        let scenario = SimulationScenario {
            graph: ProcessGraphDefinition::from(&graph),
            durations: None,
            significant_durations: Default::default(),
            options: SimulationOptions::default(),
        };
        let durations = scenario.durations_for(&log);
        // The first activity of every case has no incoming relation, and credit collection
        // follows "Send Fine" too rarely to be significant
        assert_eq!(
            durations.missing_for(&graph),
            vec!["Create Fine", "Send for Credit Collection"]
        );
        assert!(matches!(
            scenario.simulate(&log),
            Err(SimulationError::Durations(DurationError::MissingDuration(_)))
        ));
    }

    #[test]
    fn given_durations_fill_gaps_of_mined_durations() {
        let (graph, log) = fines();
        let mined = get_significant_durations(&log, &Default::default()).to_duration_table();
        let mut given = DurationTable::new();
        given.insert("Create Fine", 1.0).unwrap();
        given.insert("Send for Credit Collection", 48.0).unwrap();
        let scenario = SimulationScenario {
            graph: ProcessGraphDefinition::from(&graph),
            durations: Some(given),
            significant_durations: Default::default(),
            options: SimulationOptions {
                num_runs: 200,
                ..Default::default()
            },
        };
        let durations = scenario.durations_for(&log);
        assert!(durations.validate_for(&graph).is_ok());
        assert_eq!(durations.get("Create Fine"), Some(1.0));
        assert_eq!(durations.get("Send Fine"), mined.get("Send Fine"));
        assert_eq!(durations.get("Payment"), mined.get("Payment"));

        let summary = scenario.simulate(&log).unwrap();
        assert_eq!(summary.num_runs(), 200);

        // Given durations replace mined ones
        let mut given = DurationTable::new();
        given.insert("Create Fine", 1.0).unwrap();
        given.insert("Send for Credit Collection", 48.0).unwrap();
        given.insert("Payment", 123.0).unwrap();
        let scenario = SimulationScenario {
            durations: Some(given),
            ..scenario
        };
        assert_eq!(scenario.durations_for(&log).get("Payment"), Some(123.0));
    }
}
