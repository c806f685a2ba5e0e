//! Data models for spec orchestration
//!
//! This module contains the data structures shared by discovery, execution
//! and reporting.

mod run_result;
mod spec_file;

pub use run_result::{AggregateReport, RunOutcome, RunResult};
pub use spec_file::SpecFile;
