//! Output module
//!
//! Console reporting and report file export.

mod report_file;
mod reporter;

pub use report_file::write_report;
pub use reporter::{exit_code, Reporter};
