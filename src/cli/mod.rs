//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Parallel end-to-end spec runner
#[derive(Parser, Debug)]
#[command(name = "clickrun")]
#[command(version)]
#[command(about = "Run end-to-end test specs in parallel, one process per spec")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Configuration file (defaults to ./clickrun.yaml and friends)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every discovered spec in parallel
    Run(RunArgs),

    /// List discovered specs in launch order
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Where and how specs are discovered
#[derive(ClapArgs, Debug, Default)]
pub struct DiscoveryArgs {
    /// Directory containing the spec files
    pub dir: Option<PathBuf>,

    /// File name prefix of spec files
    #[arg(long)]
    pub prefix: Option<String>,

    /// Spec to launch before all others
    #[arg(long, conflicts_with = "no_generic")]
    pub generic: Option<String>,

    /// Do not move any spec to the front
    #[arg(long)]
    pub no_generic: bool,
}

impl DiscoveryArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.dir {
            config.spec_dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(generic) = &self.generic {
            config.generic_spec = Some(generic.clone());
        }
        if self.no_generic {
            config.generic_spec = None;
        }
    }
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,

    /// Program that executes each spec (e.g. ./node_modules/mocha/bin/mocha)
    #[arg(short, long)]
    pub launcher: Option<String>,

    /// Extra argument passed to every spec (repeatable)
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub extra_args: Vec<String>,

    /// Per-test timeout forwarded to the spec, in milliseconds
    #[arg(long)]
    pub test_timeout: Option<u64>,

    /// Do not forward the fail-fast flag
    #[arg(long)]
    pub no_bail: bool,

    /// Process timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Maximum number of specs running at once (unbounded by default)
    #[arg(short = 'j', long)]
    pub max_concurrent: Option<usize>,

    /// Output ceiling per spec in bytes
    #[arg(long)]
    pub max_output: Option<usize>,

    /// Working directory for spec processes
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Disable colored status lines
    #[arg(long)]
    pub no_color: bool,

    /// Save the aggregate report (JSON, or YAML by extension)
    #[arg(short, long)]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    /// Override config values with the ones given on the command line
    pub fn apply(&self, config: &mut AppConfig) {
        self.discovery.apply(config);

        if let Some(launcher) = &self.launcher {
            config.launcher = Some(launcher.clone());
        }
        if !self.extra_args.is_empty() {
            config.extra_args = self.extra_args.clone();
        }
        if let Some(ms) = self.test_timeout {
            config.test_timeout_ms = Some(ms);
        }
        if self.no_bail {
            config.bail = false;
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = Some(max);
        }
        if let Some(bytes) = self.max_output {
            config.max_output_bytes = bytes;
        }
        if let Some(cwd) = &self.cwd {
            config.working_dir = Some(cwd.clone());
        }
        if self.no_color {
            config.color = false;
        }
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,

    /// Show absolute paths
    #[arg(short, long)]
    pub paths: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "clickrun.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variable overrides only
        #[arg(short, long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the discovered config file)
        file: Option<PathBuf>,
    },
}
