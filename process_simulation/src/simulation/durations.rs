//! Activity durations used by the simulation
//!
//! Every activity of a process graph needs a duration (in hours) before it can be simulated.
//! Durations are mined from the log (see
//! [`get_significant_durations`](crate::analysis::case_centric::significant_durations::get_significant_durations))
//! and completed by a [`DurationEstimator`] for activities the log cannot provide.
use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::process_models::case_centric::process_graph::ProcessGraph;

///
/// Error encountered while building or completing a [`DurationTable`]
///
#[derive(Debug, thiserror::Error)]
pub enum DurationError {
    /// Activities of the process graph without a duration
    #[error("no duration for activities: {}", .0.join(", "))]
    MissingDuration(Vec<String>),
    /// An estimate is not a finite number
    #[error("invalid duration estimate `{value}` for activity `{activity}`")]
    InvalidEstimate {
        /// Activity name
        activity: String,
        /// Offending value
        value: String,
    },
    /// An estimate is negative
    #[error("negative duration {value} for activity `{activity}`")]
    NegativeDuration {
        /// Activity name
        activity: String,
        /// Offending value
        value: f64,
    },
    /// The estimator response is not a JSON object
    #[error("malformed duration estimates: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    /// The estimator failed
    #[error("duration estimator failed: {0}")]
    Estimator(String),
    /// IO error
    #[error("failed to read duration table: {0}")]
    IO(#[from] std::io::Error),
}

///
/// Source of duration estimates for activities without a known duration
///
/// Implementations receive the known durations as reference and must answer with a JSON object
/// mapping each unknown activity to a duration in hours. The answer is validated with
/// [`parse_estimates`] before anything enters a [`DurationTable`].
pub trait DurationEstimator {
    /// Estimate durations (hours) of the `unknown` activities, returning a raw JSON object
    fn estimate(&self, known: &DurationTable, unknown: &[String]) -> Result<String, DurationError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
/// Non-negative duration in hours per activity name
pub struct DurationTable {
    durations: BTreeMap<String, f64>,
}

impl DurationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table from durations that are known to be valid
    pub(crate) fn from_known<I: IntoIterator<Item = (String, f64)>>(durations: I) -> Self {
        Self {
            durations: durations.into_iter().collect(),
        }
    }

    ///
    /// Set the duration of an activity
    ///
    /// Negative and non-finite durations are rejected.
    pub fn insert(&mut self, activity: impl Into<String>, hours: f64) -> Result<(), DurationError> {
        let activity = activity.into();
        if !hours.is_finite() {
            return Err(DurationError::InvalidEstimate {
                activity,
                value: hours.to_string(),
            });
        }
        if hours < 0.0 {
            return Err(DurationError::NegativeDuration {
                activity,
                value: hours,
            });
        }
        self.durations.insert(activity, hours);
        Ok(())
    }

    /// Add all entries of `other`, replacing durations already in the table
    pub fn overlay(&mut self, other: &DurationTable) {
        self.durations
            .extend(other.durations.iter().map(|(a, d)| (a.clone(), *d)));
    }

    /// Duration of an activity
    pub fn get(&self, activity: &str) -> Option<f64> {
        self.durations.get(activity).copied()
    }

    /// Number of activities with a duration
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    /// `true` if no activity has a duration
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Iterate over `(activity, hours)` in activity order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.durations.iter().map(|(a, d)| (a.as_str(), *d))
    }

    /// Activity names of the graph without a duration (deduplicated, in graph order)
    pub fn missing_for(&self, graph: &ProcessGraph) -> Vec<String> {
        graph
            .activity_names()
            .into_iter()
            .filter(|name| !self.durations.contains_key(name))
            .collect()
    }

    /// Ensure every activity of the graph has a duration
    pub fn validate_for(&self, graph: &ProcessGraph) -> Result<(), DurationError> {
        let missing = self.missing_for(graph);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DurationError::MissingDuration(missing))
        }
    }

    ///
    /// Ask `estimator` for the durations of all activities of the graph that are missing
    ///
    /// Only the requested activities are taken from the answer. Fails if the answer is invalid or
    /// still leaves activities without a duration. Returns the estimates that were added.
    pub fn complete_with<E: DurationEstimator + ?Sized>(
        &mut self,
        graph: &ProcessGraph,
        estimator: &E,
    ) -> Result<BTreeMap<String, f64>, DurationError> {
        let missing = self.missing_for(graph);
        if missing.is_empty() {
            return Ok(BTreeMap::new());
        }
        info!(activities = ?missing, "requesting missing durations");
        let response = estimator.estimate(self, &missing)?;
        let mut estimates = parse_estimates(&response)?;
        estimates.retain(|activity, _| {
            let requested = missing.contains(activity);
            if !requested {
                debug!(activity, "ignoring estimate for activity that was not requested");
            }
            requested
        });
        self.durations
            .extend(estimates.iter().map(|(a, d)| (a.clone(), *d)));
        self.validate_for(graph)?;
        Ok(estimates)
    }

    /// Import a table from a JSON object (`{"activity": hours, ...}`)
    pub fn import_json_slice(slice: &[u8]) -> Result<Self, DurationError> {
        Ok(Self::from_known(validate_estimates(serde_json::from_slice(slice)?)?))
    }

    /// Import a table from a JSON file given by a filepath
    pub fn import_json_path<P: AsRef<Path>>(path: P) -> Result<Self, DurationError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(Self::from_known(validate_estimates(serde_json::from_reader(reader)?)?))
    }
}

///
/// Parse and validate a JSON object of duration estimates
///
/// Values can be numbers or numeric strings (e.g., `"2.5"`). Anything else, and negative or
/// non-finite numbers, is rejected.
pub fn parse_estimates(raw: &str) -> Result<BTreeMap<String, f64>, DurationError> {
    validate_estimates(serde_json::from_str(raw)?)
}

fn validate_estimates(
    object: serde_json::Map<String, serde_json::Value>,
) -> Result<BTreeMap<String, f64>, DurationError> {
    let mut ret = BTreeMap::new();
    for (activity, value) in object {
        let hours = match &value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let hours = match hours {
            Some(h) if h.is_finite() => h,
            _ => {
                return Err(DurationError::InvalidEstimate {
                    activity,
                    value: value.to_string(),
                })
            }
        };
        if hours < 0.0 {
            return Err(DurationError::NegativeDuration {
                activity,
                value: hours,
            });
        }
        ret.insert(activity, hours);
    }
    Ok(ret)
}
