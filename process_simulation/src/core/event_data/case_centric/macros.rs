use chrono::{DateTime, Duration, FixedOffset};

use super::event_log_struct::{Event, Trace};

/// Create an [`EventLog`] from activity sequences.
///
/// Each sequence is written as a bracketed list of activity names. It can be followed by
/// `; n` to add `n` identical cases. Events are time-stamped one hour apart starting at the unix
/// epoch, so the order of a sequence is also its chronological order.
///
/// # Examples
///
/// ```rust
/// use process_simulation::event_log;
///
/// // 70 cases "A, B" and 30 cases "A, C"
/// let log = event_log!(["A", "B"]; 70, ["A", "C"]; 30);
/// assert_eq!(log.traces.len(), 100);
/// ```
///
/// [`EventLog`]: crate::core::event_data::case_centric::EventLog
#[macro_export]
macro_rules! event_log {
    ($([$($act:expr),* $(,)?] $(; $count:expr)?),* $(,)?) => {{
        let mut traces: Vec<$crate::core::event_data::case_centric::Trace> = Vec::new();
        $(
            let activities: Vec<String> = vec![$(String::from($act)),*];
            let count: usize = $crate::__repetitions!($($count)?);
            for _ in 0..count {
                let case_id = traces.len().to_string();
                traces.push(
                    $crate::core::event_data::case_centric::macros::trace_from_activities(
                        case_id,
                        &activities,
                    ),
                );
            }
        )*
        $crate::core::event_data::case_centric::EventLog::from_traces(traces)
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __repetitions {
    () => {
        1usize
    };
    ($count:expr) => {
        $count
    };
}

#[doc(hidden)]
/// Build a trace with hourly spaced timestamps (used by [`event_log!`](crate::event_log))
pub fn trace_from_activities(case_id: String, activities: &[String]) -> Trace {
    let epoch: DateTime<FixedOffset> = DateTime::UNIX_EPOCH.fixed_offset();
    Trace {
        case_id,
        events: activities
            .iter()
            .enumerate()
            .map(|(i, act)| Event::new(act.clone(), epoch + Duration::hours(i as i64)))
            .collect(),
    }
}
