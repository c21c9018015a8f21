use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use super::event_log_struct::EventLog;

#[derive(Debug, Clone)]
/// Projection of an event log on just activity labels
///
/// Identical activity sequences are collapsed into variants, each annotated with the number of
/// cases that followed it.
pub struct EventLogActivityProjection {
    /// Activity names; the position of a name is its activity index
    pub activities: Vec<String>,
    /// Reverse lookup of [`EventLogActivityProjection::activities`]
    pub act_to_index: HashMap<String, usize>,
    /// Variants (sequences of activity indices) with their case counts
    pub traces: Vec<(Vec<usize>, u64)>,
}

impl From<&EventLog> for EventLogActivityProjection {
    fn from(val: &EventLog) -> Self {
        let acts_per_trace: Vec<Vec<&str>> = val
            .traces
            .par_iter()
            .map(|t| t.activities().collect())
            .collect();
        let activity_set: BTreeSet<&str> = acts_per_trace.iter().flatten().copied().collect();
        let activities: Vec<String> = activity_set.into_iter().map(String::from).collect();
        let act_to_index: HashMap<String, usize> = activities
            .iter()
            .enumerate()
            .map(|(i, act)| (act.clone(), i))
            .collect();
        let mut traces_set: HashMap<Vec<usize>, u64> = HashMap::new();
        for t in &acts_per_trace {
            let trace: Vec<usize> = t.iter().map(|act| act_to_index[*act]).collect();
            *traces_set.entry(trace).or_insert(0) += 1;
        }
        let mut traces: Vec<(Vec<usize>, u64)> = traces_set.into_iter().collect();
        traces.sort();

        EventLogActivityProjection {
            activities,
            act_to_index,
            traces,
        }
    }
}

impl EventLogActivityProjection {
    /// Index of an activity name, if it occurs in the log
    pub fn index_of(&self, activity: &str) -> Option<usize> {
        self.act_to_index.get(activity).copied()
    }

    /// Translate activity indices back to activity names
    pub fn acts_to_names(&self, acts: &[usize]) -> Vec<String> {
        acts.iter()
            .map(|act| self.activities[*act].clone())
            .collect()
    }

    /// Total number of cases
    pub fn num_cases(&self) -> u64 {
        self.traces.iter().map(|(_, w)| w).sum()
    }

    ///
    /// Suffix variants anchored at an activity
    ///
    /// Every case containing `activity` contributes the suffix starting at its first occurrence of
    /// `activity` (which is kept as the first element). Equal suffixes are merged and their case
    /// counts are summed. Cases without the activity do not contribute.
    pub fn suffix_variants(&self, activity: usize) -> Vec<(Vec<usize>, u64)> {
        let mut suffixes: HashMap<&[usize], u64> = HashMap::new();
        for (trace, w) in &self.traces {
            if let Some(pos) = trace.iter().position(|a| *a == activity) {
                *suffixes.entry(&trace[pos..]).or_insert(0) += w;
            }
        }
        let mut ret: Vec<(Vec<usize>, u64)> = suffixes
            .into_iter()
            .map(|(s, w)| (s.to_vec(), w))
            .collect();
        ret.sort();
        ret
    }
}
