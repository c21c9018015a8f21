#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]
#![doc = include_str!("../README.md")]

///
/// Core data structures: event logs and process graphs
///
pub mod core;

///
/// Branching probabilities of process graphs discovered from event logs
///
pub mod discovery;

///
/// Analysis of event data (e.g., activity durations)
///
pub mod analysis;

///
/// Monte-Carlo simulation of calibrated process graphs
///
pub mod simulation;

/// Util module with smaller helper functions
pub(crate) mod utils;

#[doc(inline)]
pub use crate::core::{EventLog, ProcessGraph};

#[doc(inline)]
pub use crate::core::event_data::case_centric::csv_import::{import_csv_path, import_csv_reader};

#[doc(inline)]
pub use crate::core::process_models::case_centric::process_graph::ProcessGraphDefinition;

#[doc(inline)]
pub use crate::analysis::case_centric::significant_durations::get_significant_durations;

#[doc(inline)]
pub use crate::discovery::case_centric::branching::{
    estimate_gateway_probabilities, GatewayProbabilities,
};

#[doc(inline)]
pub use crate::simulation::{
    simulate_process, DurationTable, SimulationError, SimulationOptions, SimulationScenario,
    SimulationSummary,
};
