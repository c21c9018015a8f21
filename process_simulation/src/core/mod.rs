//! Core modules for process simulation

pub use chrono;
pub mod event_data;

pub mod process_models;

pub use event_data::case_centric::EventLog;
pub use process_models::case_centric::process_graph::ProcessGraph;
