//! Import of case-centric event logs from CSV files
//!
//! Each CSV row is one event. The case identifier, activity, and timestamp columns are selected by
//! name through [`CsvImportOptions`]. Any other columns are ignored.
use std::{collections::HashMap, fs::File, io::Read, path::Path};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::constants::{ACTIVITY_KEY, CASE_ID_KEY, TIMESTAMP_KEY};
use super::event_log_struct::{Event, EventLog, Trace};

/// Options for [`import_csv_path`] and [`import_csv_reader`]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CsvImportOptions {
    /// Column holding the case identifier
    pub case_id_key: String,
    /// Column holding the activity name
    pub activity_key: String,
    /// Column holding the event timestamp
    pub timestamp_key: String,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvImportOptions {
    fn default() -> Self {
        Self {
            case_id_key: CASE_ID_KEY.to_string(),
            activity_key: ACTIVITY_KEY.to_string(),
            timestamp_key: TIMESTAMP_KEY.to_string(),
            delimiter: b',',
        }
    }
}

///
/// Error encountered while importing an event log from CSV
///
#[derive(Debug, thiserror::Error)]
pub enum CsvImportError {
    /// IO error
    #[error("failed to read CSV event log: {0}")]
    IO(#[from] std::io::Error),
    /// CSV format error
    #[error("malformed CSV event log: {0}")]
    Csv(#[from] csv::Error),
    /// A required column is missing from the header
    #[error("missing column `{0}` in CSV header")]
    MissingColumn(String),
    /// A timestamp could not be parsed
    #[error("invalid timestamp `{value}` in row {row}")]
    InvalidTimestamp {
        /// Row number (1-based, header excluded)
        row: usize,
        /// Offending value
        value: String,
    },
}

const NAIVE_DATETIME_FORMATS: [&str; 3] =
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y/%m/%d %H:%M:%S"];

///
/// Parse a timestamp
///
/// RFC 3339 timestamps keep their offset. Timestamps without offset, and plain dates, are
/// interpreted as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt);
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}

///
/// Import an [`EventLog`] from a CSV reader
///
/// Traces appear in the order their case identifier is first seen. Events of each trace are sorted
/// chronologically (stable with respect to file order).
pub fn import_csv_reader<R: Read>(
    reader: R,
    options: &CsvImportOptions,
) -> Result<EventLog, CsvImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let column = |key: &str| {
        headers
            .iter()
            .position(|h| h == key)
            .ok_or_else(|| CsvImportError::MissingColumn(key.to_string()))
    };
    let case_col = column(&options.case_id_key)?;
    let act_col = column(&options.activity_key)?;
    let time_col = column(&options.timestamp_key)?;

    let mut traces: Vec<Trace> = Vec::new();
    let mut case_to_index: HashMap<String, usize> = HashMap::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let case_id = record.get(case_col).unwrap_or_default();
        let activity = record.get(act_col).unwrap_or_default();
        let raw_time = record.get(time_col).unwrap_or_default();
        let timestamp = parse_timestamp(raw_time).ok_or_else(|| CsvImportError::InvalidTimestamp {
            row: row + 1,
            value: raw_time.to_string(),
        })?;
        let index = *case_to_index.entry(case_id.to_string()).or_insert_with(|| {
            traces.push(Trace::new(case_id.to_string()));
            traces.len() - 1
        });
        traces[index]
            .events
            .push(Event::new(activity.to_string(), timestamp));
    }
    traces.iter_mut().for_each(Trace::sort_chronologically);
    Ok(EventLog::from_traces(traces))
}

///
/// Import an [`EventLog`] from a CSV file given by a filepath
///
/// See also [`import_csv_reader`].
pub fn import_csv_path<P: AsRef<Path>>(
    path: P,
    options: &CsvImportOptions,
) -> Result<EventLog, CsvImportError> {
    let file = File::open(path)?;
    import_csv_reader(file, options)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::utils::test_utils::get_test_data_path;

    const SAMPLE: &str = "case:concept:name,concept:name,time:timestamp,org:resource
1,Register,2024-01-01 08:00:00,Ann
2,Register,2024-01-01T09:00:00+01:00,Bob
1,Check,2024-01-01 10:30:00,Ann
1,Approve,2024-01-01 09:00:00,Ann
";

    #[test]
    fn events_are_grouped_and_sorted() {
        let log = import_csv_reader(SAMPLE.as_bytes(), &CsvImportOptions::default()).unwrap();
        assert_eq!(log.traces.len(), 2);
        assert_eq!(log.traces[0].case_id, "1");
        assert_eq!(
            log.traces[0].activities().collect::<Vec<_>>(),
            vec!["Register", "Approve", "Check"]
        );
        assert_eq!(log.traces[1].events.len(), 1);
    }

    #[test]
    fn missing_column_is_reported() {
        let options = CsvImportOptions {
            timestamp_key: "start".into(),
            ..CsvImportOptions::default()
        };
        let res = import_csv_reader(SAMPLE.as_bytes(), &options);
        assert!(matches!(res, Err(CsvImportError::MissingColumn(c)) if c == "start"));
    }

    #[test]
    fn invalid_timestamp_is_reported() {
        let data = "case:concept:name,concept:name,time:timestamp\n1,A,yesterday\n";
        let res = import_csv_reader(data.as_bytes(), &CsvImportOptions::default());
        assert!(matches!(
            res,
            Err(CsvImportError::InvalidTimestamp { row: 1, .. })
        ));
    }

    #[test]
    fn semicolon_delimited_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "case;activity;time").unwrap();
        writeln!(file, "c1;A;2024-05-01").unwrap();
        writeln!(file, "c1;B;2024-05-02").unwrap();
        let options = CsvImportOptions {
            case_id_key: "case".into(),
            activity_key: "activity".into(),
            timestamp_key: "time".into(),
            delimiter: b';',
        };
        let log = import_csv_path(file.path(), &options).unwrap();
        assert_eq!(log.num_events(), 2);
    }

    #[test]
    fn import_running_example() {
        let path = get_test_data_path().join("csv").join("fines.csv");
        let log = import_csv_path(path, &CsvImportOptions::default()).unwrap();
        assert_eq!(log.traces.len(), 10);
        assert!(log.activities().contains("Send Fine"));
    }
}
