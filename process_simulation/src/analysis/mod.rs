//! Process Analysis
//!
//! This module contains techniques related to the analysis of event data.

pub mod case_centric;
