//! Significant Activity Durations
//!
//! Derives a duration per activity from the flow times of its significant incoming
//! directly-follows relations.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{simulation::durations::DurationTable, EventLog};

const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.7;
const DEFAULT_ROUND_TO_DECIMALS: u32 = 2;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Options for [`get_significant_durations`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SignificantDurationOptions {
    /// A directly-follows relation is significant if the absolute value of its significance is
    /// above this threshold.
    pub significance_threshold: f64,
    /// Number of decimals the durations (in hours) are rounded to.
    pub round_to_decimals: u32,
}

impl Default for SignificantDurationOptions {
    fn default() -> Self {
        Self {
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            round_to_decimals: DEFAULT_ROUND_TO_DECIMALS,
        }
    }
}

/// Frequency and accumulated flow time (seconds) of a directly-follows relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowStatistics {
    /// Number of occurrences over all cases
    pub frequency: u64,
    /// Sum of all flow times in seconds
    pub total_seconds: f64,
}

impl FlowStatistics {
    /// Mean flow time in seconds
    pub fn mean_seconds(&self) -> f64 {
        if self.frequency == 0 {
            0.0
        } else {
            self.total_seconds / self.frequency as f64
        }
    }
}

/// Weighted significant duration (hours) per activity.
///
/// An activity maps to `None` if none of its incoming relations is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignificantDurations {
    /// Duration in hours per activity of the log
    pub durations: BTreeMap<String, Option<f64>>,
}

impl SignificantDurations {
    /// Activities without a significant duration
    pub fn unknown(&self) -> Vec<&str> {
        self.durations
            .iter()
            .filter(|(_, d)| d.is_none())
            .map(|(a, _)| a.as_str())
            .collect()
    }

    /// Known durations as a (possibly incomplete) [`DurationTable`]
    pub fn to_duration_table(&self) -> DurationTable {
        DurationTable::from_known(
            self.durations
                .iter()
                .filter_map(|(a, d)| d.map(|d| (a.clone(), d))),
        )
    }
}

/// Directly-follows relations of a log with their flow statistics
pub fn get_flow_statistics(log: &EventLog) -> HashMap<(String, String), FlowStatistics> {
    let mut flows: HashMap<(String, String), FlowStatistics> = HashMap::new();
    for trace in &log.traces {
        for (a, b) in trace.events.iter().tuple_windows() {
            let seconds = (b.timestamp - a.timestamp).num_milliseconds() as f64 / 1000.0;
            let entry = flows
                .entry((a.activity.clone(), b.activity.clone()))
                .or_default();
            entry.frequency += 1;
            entry.total_seconds += seconds;
        }
    }
    flows
}

/// Significance of the relation `source -> target`
///
/// For distinct activities this is `(f(a,b) - f(b,a)) / (f(a,b) + f(b,a) + 1)`, for a self-loop
/// `f(a,a) / (f(a,a) + 1)`.
fn significance(
    flows: &HashMap<(String, String), FlowStatistics>,
    source: &str,
    target: &str,
) -> f64 {
    let frequency = |a: &str, b: &str| {
        flows
            .get(&(a.to_string(), b.to_string()))
            .map_or(0.0, |s| s.frequency as f64)
    };
    let forward = frequency(source, target);
    if source == target {
        forward / (forward + 1.0)
    } else {
        let backward = frequency(target, source);
        (forward - backward) / (forward + backward + 1.0)
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Compute the weighted significant duration of every activity of a log.
///
/// For each target activity, the accumulated flow time of all significant incoming relations is
/// divided by the frequency of all incoming relations. The result is converted to hours and
/// rounded.
pub fn get_significant_durations(
    log: &EventLog,
    options: &SignificantDurationOptions,
) -> SignificantDurations {
    let flows = get_flow_statistics(log);
    let mut incoming: HashMap<&str, Vec<(&str, &FlowStatistics)>> = HashMap::new();
    for ((source, target), stats) in &flows {
        incoming
            .entry(target.as_str())
            .or_default()
            .push((source.as_str(), stats));
    }
    let durations = log
        .activities()
        .into_iter()
        .map(|activity| {
            let duration = incoming.get(activity.as_str()).and_then(|sources| {
                let denominator: u64 = sources.iter().map(|(_, s)| s.frequency).sum();
                let significant: Vec<_> = sources
                    .iter()
                    .filter(|(source, _)| {
                        significance(&flows, source, &activity).abs()
                            > options.significance_threshold
                    })
                    .collect();
                if significant.is_empty() || denominator == 0 {
                    return None;
                }
                let numerator: f64 = significant
                    .iter()
                    .map(|(_, s)| s.mean_seconds() * s.frequency as f64)
                    .sum();
                Some(round_to(
                    numerator / denominator as f64 / SECONDS_PER_HOUR,
                    options.round_to_decimals,
                ))
            });
            (activity, duration)
        })
        .collect();
    SignificantDurations { durations }
}
