use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
///
/// Single event of a case: an executed activity together with its timestamp
///
pub struct Event {
    /// Name of the executed activity
    pub activity: String,
    /// Time at which the activity was recorded
    pub timestamp: DateTime<FixedOffset>,
}

impl Event {
    ///
    /// Create a new event for the given activity and timestamp
    ///
    pub fn new(activity: String, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            activity,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
///
/// A trace (i.e., one case) of an event log
///
/// Events are kept in chronological order
pub struct Trace {
    /// Identifier shared by all events of this case
    pub case_id: String,
    /// Chronologically ordered events
    pub events: Vec<Event>,
}

impl Trace {
    ///
    /// Create a new empty trace with the given case identifier
    ///
    pub fn new(case_id: String) -> Self {
        Self {
            case_id,
            events: Vec::new(),
        }
    }

    ///
    /// Sort the events by timestamp
    ///
    /// The sort is stable, so events sharing a timestamp keep their recorded order.
    pub fn sort_chronologically(&mut self) {
        self.events.sort_by_key(|e| e.timestamp);
    }

    /// Activity names of this trace in execution order
    pub fn activities(&self) -> impl Iterator<Item = &str> + '_ {
        self.events.iter().map(|e| e.activity.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
///
/// Case-centric event log: an ordered list of [`Trace`]s
///
pub struct EventLog {
    /// Cases of the log
    pub traces: Vec<Trace>,
}

impl EventLog {
    ///
    /// Create a new, empty event log
    ///
    pub fn new() -> Self {
        Self { traces: Vec::new() }
    }

    ///
    /// Create an event log from the given traces
    ///
    pub fn from_traces(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    /// Number of events over all traces
    pub fn num_events(&self) -> usize {
        self.traces.iter().map(|t| t.events.len()).sum()
    }

    ///
    /// All distinct activity names occurring in the log
    ///
    pub fn activities(&self) -> HashSet<String> {
        self.traces
            .iter()
            .flat_map(|t| t.events.iter().map(|e| e.activity.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn sorting_keeps_order_of_simultaneous_events() {
        let mut trace = Trace::new("c1".into());
        trace.events.push(Event::new("late".into(), ts(5)));
        trace.events.push(Event::new("first".into(), ts(1)));
        trace.events.push(Event::new("second".into(), ts(1)));
        trace.sort_chronologically();
        assert_eq!(
            trace.activities().collect::<Vec<_>>(),
            vec!["first", "second", "late"]
        );
    }

    #[test]
    fn activities_of_log() {
        let mut t1 = Trace::new("1".into());
        t1.events.push(Event::new("a".into(), ts(1)));
        t1.events.push(Event::new("b".into(), ts(2)));
        let mut t2 = Trace::new("2".into());
        t2.events.push(Event::new("a".into(), ts(3)));
        let log = EventLog::from_traces(vec![t1, t2]);
        assert_eq!(log.num_events(), 3);
        assert_eq!(
            log.activities(),
            vec!["a".to_string(), "b".to_string()].into_iter().collect()
        );
    }
}
