//! Discovery for case-centric event data
pub mod branching;
