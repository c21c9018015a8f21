//! Analysis of case-centric event data
pub mod significant_durations;
