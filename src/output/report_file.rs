//! Report file export
//!
//! Saves the aggregate report for CI archiving, as YAML or JSON depending
//! on the file extension.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::is_yaml_file;
use crate::models::AggregateReport;

/// Write the report to `path`
pub fn write_report(path: impl AsRef<Path>, report: &AggregateReport) -> Result<()> {
    let path = path.as_ref();
    let content = if is_yaml_file(path) {
        serde_yaml::to_string(report).context("Failed to serialize report")?
    } else {
        serde_json::to_string_pretty(report).context("Failed to serialize report")?
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report file: {}", path.display()))?;

    Ok(())
}
