//! Configuration module
//!
//! Handles loading and managing configuration. Values are layered as
//! defaults, then config file, then environment, then command line.

mod env;
mod file;

pub use env::EnvConfig;
pub(crate) use file::is_yaml_file;
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::executor::{
    Invocation, Orchestrator, SpecRunner, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECS,
};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory containing the spec files
    pub spec_dir: PathBuf,

    /// File name prefix a spec must start with
    pub prefix: String,

    /// Spec launched ahead of all others
    pub generic_spec: Option<String>,

    /// Program used to execute each spec; specs run directly when unset
    pub launcher: Option<String>,

    /// Extra arguments appended to every spec invocation
    pub extra_args: Vec<String>,

    /// Per-test timeout forwarded to the spec, in milliseconds
    pub test_timeout_ms: Option<u64>,

    /// Forward the fail-fast flag to the spec
    pub bail: bool,

    /// Process timeout in seconds
    pub timeout_secs: u64,

    /// Output ceiling per spec in bytes
    pub max_output_bytes: usize,

    /// Maximum concurrently running specs (unbounded when unset)
    pub max_concurrent: Option<usize>,

    /// Working directory for spec processes
    pub working_dir: Option<PathBuf>,

    /// Colorize status lines
    pub color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            spec_dir: PathBuf::from("clicktests"),
            prefix: "spec.".to_string(),
            generic_spec: Some("spec.generic.js".to_string()),
            launcher: None,
            extra_args: Vec::new(),
            test_timeout_ms: Some(35000),
            bail: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrent: None,
            working_dir: None,
            color: true,
        }
    }
}

impl AppConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            anyhow::bail!("Spec prefix must not be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("Process timeout must be at least 1 second");
        }
        if self.max_output_bytes == 0 {
            anyhow::bail!("Output limit must be greater than 0 bytes");
        }
        if self.max_concurrent == Some(0) {
            anyhow::bail!("max_concurrent must be at least 1 when set");
        }
        if let Some(generic) = &self.generic_spec {
            if !generic.starts_with(&self.prefix) {
                tracing::warn!(
                    "Generic spec '{}' does not match prefix '{}' and will never be discovered",
                    generic,
                    self.prefix
                );
            }
        }
        Ok(())
    }

    /// How each spec is invoked
    pub fn invocation(&self) -> Invocation {
        let mut invocation = Invocation::new()
            .bail(self.bail)
            .with_args(self.extra_args.iter().cloned());

        if let Some(launcher) = &self.launcher {
            invocation = invocation.with_launcher(launcher.clone());
        }
        if let Some(ms) = self.test_timeout_ms {
            invocation = invocation.with_test_timeout_ms(ms);
        }
        if let Some(dir) = &self.working_dir {
            invocation = invocation.with_working_dir(dir.clone());
        }

        invocation
    }

    /// Build the spec runner
    pub fn runner(&self) -> SpecRunner {
        SpecRunner::new(self.invocation())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_output(self.max_output_bytes)
    }

    /// Build the suite orchestrator
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.runner()).with_max_concurrent(self.max_concurrent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.spec_dir, PathBuf::from("clicktests"));
        assert_eq!(config.prefix, "spec.");
        assert_eq!(config.generic_spec.as_deref(), Some("spec.generic.js"));
        assert_eq!(config.max_output_bytes, 10 * 1024 * 1024);
        assert!(config.max_concurrent.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invocation_from_config() {
        let config = AppConfig {
            launcher: Some("./node_modules/mocha/bin/mocha".to_string()),
            ..Default::default()
        };
        let invocation = config.invocation();
        assert_eq!(
            invocation.launcher.as_deref(),
            Some("./node_modules/mocha/bin/mocha")
        );
        assert_eq!(invocation.spec_args(), vec!["--timeout=35000", "-b"]);
        assert!(invocation.working_dir.is_none());

        let config = AppConfig {
            test_timeout_ms: None,
            bail: false,
            extra_args: vec!["--reporter=dot".to_string()],
            working_dir: Some(PathBuf::from("/repo")),
            ..Default::default()
        };
        let invocation = config.invocation();
        assert!(invocation.launcher.is_none());
        assert_eq!(invocation.spec_args(), vec!["--reporter=dot"]);
        assert_eq!(invocation.working_dir, Some(PathBuf::from("/repo")));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_cap = AppConfig {
            max_concurrent: Some(0),
            ..Default::default()
        };
        assert!(zero_cap.validate().is_err());

        let empty_prefix = AppConfig {
            prefix: String::new(),
            ..Default::default()
        };
        assert!(empty_prefix.validate().is_err());

        let zero_timeout = AppConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("spec_dir: e2e\nmax_concurrent: 3\n").unwrap();
        assert_eq!(config.spec_dir, PathBuf::from("e2e"));
        assert_eq!(config.max_concurrent, Some(3));
        assert_eq!(config.prefix, "spec.");
        assert!(config.bail);
    }
}
