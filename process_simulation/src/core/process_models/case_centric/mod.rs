//! Case-centric process models
pub mod process_graph;
