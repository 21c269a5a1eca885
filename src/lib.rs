//! Reachability analysis of 1-bounded place/transition nets.
//!
//! The crate builds a [`net::Net`], enumerates its markings explicitly
//! ([`analysis`]), computes the exact reachable set as a BDD fixed point
//! ([`symbolic`]) and answers deadlock and optimisation queries through an
//! integer relaxation of the state equation refined against that set
//! ([`relaxed`]). [`pipeline::Analyzer`] runs the phases in sequence.

pub mod analysis;
pub mod config;
pub mod net;
pub mod options;
pub mod pipeline;
pub mod relaxed;
pub mod report;
pub mod symbolic;
pub mod util;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::AnalysisConfig;
pub use pipeline::{AnalysisError, Analyzer};
