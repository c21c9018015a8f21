//! Process Discovery
//!
//! Discovery algorithms learn (parts of) process models from input event data. Here, they
//! calibrate a given process graph with branching probabilities mined from an event log.
pub mod case_centric;
