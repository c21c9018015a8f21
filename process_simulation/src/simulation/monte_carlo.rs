//! Repeated simulation runs and their aggregation
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    engine::{SimulationModel, SimulationRun},
    SimulationError, SimulationOptions,
};

/// Seed of a single run, derived from the seed of the whole simulation
fn run_seed(seed: u64, run: usize) -> u64 {
    seed ^ (run as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

///
/// Simulate `options.num_runs` independent runs
///
/// Runs are executed in parallel. Each run gets its own generator seeded from
/// [`SimulationOptions::seed`] and its index, so the result does not depend on scheduling.
/// Results are returned in run order.
pub fn run_monte_carlo(
    model: &SimulationModel,
    options: &SimulationOptions,
) -> Result<Vec<SimulationRun>, SimulationError> {
    (0..options.num_runs)
        .into_par_iter()
        .map(|run| {
            let mut rng = StdRng::seed_from_u64(run_seed(options.seed, run));
            model.simulate_run(&mut rng, options)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
/// Runs sharing the same duration
pub struct DurationGroup {
    /// Duration (hours)
    pub duration: f64,
    /// Adjusted duration (hours) of the first run with this duration
    pub adjusted_duration: f64,
    /// Share of all runs in percent
    pub percentage: f64,
    /// Trace of the first run with this duration
    pub trace: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
/// Aggregated result of a Monte-Carlo simulation
pub struct SimulationSummary {
    /// Distinct durations, by descending percentage
    pub groups: Vec<DurationGroup>,
    /// All runs in run order
    pub runs: Vec<SimulationRun>,
    /// Mean duration over all runs
    pub mean_duration: f64,
    /// Mean adjusted duration over all runs
    pub mean_adjusted_duration: f64,
}

impl SimulationSummary {
    /// Number of simulated runs
    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    ///
    /// Relative reduction of the mean duration achieved by `improved`
    ///
    /// Positive if `improved` is faster. `None` if the mean duration of `self` is 0.
    pub fn relative_time_saved(&self, improved: &SimulationSummary) -> Option<f64> {
        if self.mean_duration == 0.0 {
            return None;
        }
        Some((self.mean_duration - improved.mean_duration) / self.mean_duration)
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        0.0
    } else {
        values.sum::<f64>() / n as f64
    }
}

///
/// Aggregate simulation runs
///
/// Runs are grouped by their exact duration. Each group is represented by the first run (in run
/// order) with that duration. Groups with equal percentages keep the order in which their
/// duration first occurred.
pub fn summarize(runs: Vec<SimulationRun>) -> SimulationSummary {
    let total = runs.len();
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut group_of: HashMap<OrderedFloat<f64>, usize> = HashMap::new();
    for (i, run) in runs.iter().enumerate() {
        let group = *group_of
            .entry(OrderedFloat(run.duration))
            .or_insert_with(|| {
                groups.push((i, 0));
                groups.len() - 1
            });
        groups[group].1 += 1;
    }
    let mut groups: Vec<DurationGroup> = groups
        .into_iter()
        .map(|(first, count)| DurationGroup {
            duration: runs[first].duration,
            adjusted_duration: runs[first].adjusted_duration,
            percentage: count as f64 / total as f64 * 100.0,
            trace: runs[first].trace.clone(),
        })
        .collect();
    groups.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

    let mean_duration = mean(runs.iter().map(|r| r.duration));
    let mean_adjusted_duration = mean(runs.iter().map(|r| r.adjusted_duration));
    info!(
        runs = total,
        distinct_durations = groups.len(),
        mean_duration,
        mean_adjusted_duration,
        "simulation finished"
    );
    SimulationSummary {
        groups,
        runs,
        mean_duration,
        mean_adjusted_duration,
    }
}
