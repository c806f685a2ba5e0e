//! Run result models
//!
//! Defines the outcome of a single spec run and the aggregate report
//! assembled from all of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of one spec run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Exited with status zero before the timeout
    Passed,
    /// Exited non-zero; `None` when terminated by a signal
    Failed { exit_code: Option<i32> },
    /// Killed after exceeding the process timeout
    TimedOut { after_ms: u64 },
    /// Killed after producing more output than the buffer allows
    OutputLimitExceeded { limit_bytes: usize },
    /// The process could not be started at all
    LaunchFailed { reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Passed)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            RunOutcome::Passed => "✓",
            RunOutcome::Failed { .. } => "✗",
            RunOutcome::TimedOut { .. } => "⏱",
            RunOutcome::OutputLimitExceeded { .. } => "!",
            RunOutcome::LaunchFailed { .. } => "!",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Passed => write!(f, "passed"),
            RunOutcome::Failed {
                exit_code: Some(code),
            } => write!(f, "failed with exit code {code}"),
            RunOutcome::Failed { exit_code: None } => write!(f, "terminated by signal"),
            RunOutcome::TimedOut { after_ms } => write!(f, "timed out after {after_ms}ms"),
            RunOutcome::OutputLimitExceeded { limit_bytes } => {
                write!(f, "output exceeded {limit_bytes} bytes")
            }
            RunOutcome::LaunchFailed { reason } => write!(f, "failed to launch: {reason}"),
        }
    }
}

/// Result of running exactly one spec
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub name: String,
    /// Combined stdout/stderr in the order the process emitted it
    pub output: String,
    pub success: bool,
    pub outcome: RunOutcome,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn new(name: impl Into<String>, outcome: RunOutcome, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            success: outcome.is_success(),
            outcome,
            duration_ms: 0,
        }
    }

    #[cfg(test)]
    pub fn passed(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(name, RunOutcome::Passed, output)
    }

    #[cfg(test)]
    pub fn failed(name: impl Into<String>, exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self::new(name, RunOutcome::Failed { exit_code }, output)
    }

    pub fn launch_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            name,
            RunOutcome::LaunchFailed {
                reason: reason.into(),
            },
            String::new(),
        )
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms] - {}",
            self.outcome.symbol(),
            self.name,
            self.duration_ms,
            self.outcome
        )
    }
}

/// All run results of one orchestration, in completion order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateReport {
    pub results: Vec<RunResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AggregateReport {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Append a result as it arrives
    pub fn push(&mut self, result: RunResult) {
        self.results.push(result);
    }

    /// Mark the report complete
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Logical AND of every result; true when nothing ran
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    /// Failed results in report order
    pub fn failures(&self) -> impl Iterator<Item = &RunResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

impl Default for AggregateReport {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<RunResult> for AggregateReport {
    fn from_iter<I: IntoIterator<Item = RunResult>>(iter: I) -> Self {
        let mut report = Self::new();
        for result in iter {
            report.push(result);
        }
        report
    }
}
