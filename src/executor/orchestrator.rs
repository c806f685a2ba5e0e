//! Parallel spec orchestration
//!
//! Fans a [`SpecRunner`] out over every discovered spec and gathers the
//! results, in completion order, into an [`AggregateReport`].

use futures::stream::{FuturesUnordered, StreamExt};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use super::runner::SpecRunner;
use crate::discovery::{self, DiscoveryError};
use crate::models::{AggregateReport, RunResult, SpecFile};

/// Runs a whole suite of specs concurrently
pub struct Orchestrator {
    runner: SpecRunner,
    max_concurrent: Option<usize>,
}

impl Orchestrator {
    pub fn new(runner: SpecRunner) -> Self {
        Self {
            runner,
            max_concurrent: None,
        }
    }

    /// Cap the number of simultaneously running specs; `None` runs all of
    /// them at once
    pub fn with_max_concurrent(mut self, max_concurrent: Option<usize>) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Run every spec to completion
    ///
    /// Specs launch in the given order. `on_result` is called for each
    /// result as soon as it arrives; the report holds the results in that
    /// same completion order. A failing spec never stops the others.
    pub async fn run<F>(&self, specs: Vec<SpecFile>, mut on_result: F) -> AggregateReport
    where
        F: FnMut(&RunResult),
    {
        let submitted = specs.len();
        let limit = self.max_concurrent.unwrap_or(usize::MAX).max(1);
        let start = Instant::now();

        match self.max_concurrent {
            Some(max) => info!("Running {} specs (max {} concurrent)", submitted, max),
            None => info!("Running {} specs in parallel", submitted),
        }

        let mut report = AggregateReport::new();
        let mut queue = specs.into_iter();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < limit {
                let Some(spec) = queue.next() else { break };
                in_flight.push(self.runner.start(&spec));
            }

            match in_flight.next().await {
                Some(result) => {
                    debug!("{}", result);
                    on_result(&result);
                    report.push(result);
                }
                None => break,
            }
        }

        debug_assert_eq!(report.total(), submitted);

        info!(
            "Finished {} specs in {}ms - Pass: {}/{}",
            submitted,
            start.elapsed().as_millis(),
            report.passed(),
            report.total()
        );

        report.finish()
    }

    /// Discover specs and run them
    ///
    /// Fails before launching anything when the spec directory cannot be
    /// read.
    pub async fn discover_and_run<F>(
        &self,
        dir: impl AsRef<Path>,
        prefix: &str,
        generic: Option<&str>,
        on_result: F,
    ) -> Result<AggregateReport, DiscoveryError>
    where
        F: FnMut(&RunResult),
    {
        let specs = discovery::discover(dir, prefix, generic)?;
        Ok(self.run(specs, on_result).await)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(SpecRunner::default())
    }
}
