//! Spec execution engine
//!
//! Provides the single-spec subprocess runner and the parallel orchestrator
//! built on top of it.

mod buffer;
mod orchestrator;
mod runner;

pub use buffer::DEFAULT_MAX_OUTPUT_BYTES;
pub use orchestrator::Orchestrator;
pub use runner::{Invocation, SpecRunner, DEFAULT_TIMEOUT_SECS};
