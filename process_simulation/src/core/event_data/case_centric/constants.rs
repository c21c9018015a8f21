/// Default column holding the case identifier
pub const CASE_ID_KEY: &str = "case:concept:name";
/// Default column holding the activity name
pub const ACTIVITY_KEY: &str = "concept:name";
/// Default column holding the event timestamp
pub const TIMESTAMP_KEY: &str = "time:timestamp";
