//! Console reporter for spec runs
//!
//! Prints a status line per spec as it completes and, once the suite is
//! done, the full log of every failed spec.

use std::io::{self, Write};
use std::process::ExitCode;

use crate::models::{AggregateReport, RunResult};

/// Writes live status lines and failure logs
pub struct Reporter<W: Write> {
    out: W,
    colorize: bool,
}

impl Reporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Print the one-line status of a finished spec
    pub fn notice(&mut self, result: &RunResult) -> io::Result<()> {
        let line = self.format_notice(result);
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    fn format_notice(&self, result: &RunResult) -> String {
        let status = match (result.success, self.colorize) {
            (true, true) => "\x1b[32m✓ PASS\x1b[0m",
            (true, false) => "✓ PASS",
            (false, true) => "\x1b[31m✗ FAIL\x1b[0m",
            (false, false) => "✗ FAIL",
        };

        let mut line = format!("{} {} [{}ms]", status, result.name, result.duration_ms);
        if !result.success {
            line.push_str(&format!(" - {}", result.outcome));
        }
        line
    }

    /// Print the framed log of every failed spec, in report order
    ///
    /// Returns the overall success flag. Nothing is printed when every spec
    /// passed.
    pub fn report_failures(&mut self, report: &AggregateReport) -> io::Result<bool> {
        for result in report.failures() {
            // One write per block keeps logs of different specs apart.
            self.out.write_all(failure_block(result).as_bytes())?;
        }
        self.out.flush()?;

        Ok(report.success())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Start marker framing a failed spec's log
pub fn start_marker(name: &str) -> String {
    format!("---- start of {name} log ----")
}

/// End marker framing a failed spec's log
pub fn end_marker(name: &str) -> String {
    format!("----- end of {name} log -----")
}

fn failure_block(result: &RunResult) -> String {
    let mut block = String::with_capacity(result.output.len() + 128);
    block.push_str(&start_marker(&result.name));
    block.push('\n');
    block.push_str(&result.output);
    if !result.output.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(&end_marker(&result.name));
    block.push('\n');
    block
}

/// Map the overall verdict to the process exit status
pub fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
