//! clickrun - Parallel end-to-end spec runner
//!
//! Discovers test spec files, runs each one as its own process, and
//! reports a single pass/fail verdict for the whole suite.
//!
//! ## Features
//!
//! - One isolated process per spec, all running at once (or capped with `-j`)
//! - The generic spec always launches first so baseline failures show early
//! - Live status line per spec as it finishes
//! - Full, unmixed log of every failed spec at the end
//! - Exit status 0 only when every spec passed
//!
//! ## Usage
//!
//! ```bash
//! # Run the click tests with mocha
//! clickrun run clicktests --launcher ./node_modules/mocha/bin/mocha
//!
//! # Cap concurrency and keep a JSON report
//! clickrun run -j 4 --report target/clicktests.json
//!
//! # Show the launch order
//! clickrun list --paths
//!
//! # Write an example config file
//! clickrun config init
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod discovery;
mod executor;
mod models;
mod output;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use output::{exit_code, write_report, Reporter};
use utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::from_str(&args.log_level).unwrap_or(LogLevel::Info)
    };
    init_logger(level);

    match args.command {
        cli::Command::Run(ref run_args) => {
            let config = load_config(&args)?;
            run_specs(run_args, config).await
        }
        cli::Command::List(ref list_args) => {
            let config = load_config(&args)?;
            list_specs(list_args, config)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Config(ref config_args) => {
            manage_config(&args, config_args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Layer config file and environment over the defaults
fn load_config(args: &Args) -> Result<AppConfig> {
    let env = EnvConfig::load();

    let file = match args.config.clone().or_else(|| env.config_file.clone().map(Into::into)) {
        Some(path) => ConfigFile::load(&path)?,
        None => ConfigFile::load_default()?,
    };

    let mut config = file.app;
    if env.has_any() {
        debug!("Applying environment overrides");
        env.apply(&mut config);
    }

    Ok(config)
}

async fn run_specs(args: &cli::RunArgs, mut config: AppConfig) -> Result<ExitCode> {
    args.apply(&mut config);
    config.validate()?;

    let mut reporter = Reporter::stdout();
    if !config.color {
        reporter = reporter.no_color();
    }

    info!(
        "Running specs from {} in parallel (this will take a while...)",
        config.spec_dir.display()
    );

    let orchestrator = config.orchestrator();
    let report = orchestrator
        .discover_and_run(
            &config.spec_dir,
            &config.prefix,
            config.generic_spec.as_deref(),
            |result| {
                if let Err(e) = reporter.notice(result) {
                    warn!("Failed to print status of {}: {}", result.name, e);
                }
            },
        )
        .await
        .context("Spec discovery failed")?;

    let success = reporter
        .report_failures(&report)
        .context("Failed to print failure logs")?;

    info!(
        "{}/{} specs passed ({} failed) in {}ms",
        report.passed(),
        report.total(),
        report.failed(),
        report.duration_ms().unwrap_or_default()
    );

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        info!("Report written to {}", path.display());
    }

    Ok(exit_code(success))
}

fn list_specs(args: &cli::ListArgs, mut config: AppConfig) -> Result<()> {
    args.discovery.apply(&mut config);

    let specs = discovery::discover(
        &config.spec_dir,
        &config.prefix,
        config.generic_spec.as_deref(),
    )
    .context("Spec discovery failed")?;

    if specs.is_empty() {
        println!(
            "No specs matching '{}*' in {}",
            config.prefix,
            config.spec_dir.display()
        );
        return Ok(());
    }

    println!("\nSpecs in launch order ({} total)\n", specs.len());
    for (i, spec) in specs.iter().enumerate() {
        if args.paths {
            println!("  {:2}. {} ({})", i + 1, spec, spec.path.display());
        } else {
            println!("  {:2}. {}", i + 1, spec);
        }
    }
    println!();

    Ok(())
}

fn manage_config(args: &Args, config_args: &cli::ConfigArgs) -> Result<()> {
    match &config_args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            ConfigFile::example().save(output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env, format } => {
            if *env {
                EnvConfig::load().print_summary();
            } else {
                let effective = ConfigFile {
                    app: load_config(args)?,
                    ..ConfigFile::default()
                };
                let output = if format == "json" {
                    serde_json::to_string_pretty(&effective)?
                } else {
                    serde_yaml::to_string(&effective)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .clone()
                .or_else(ConfigFile::find)
                .unwrap_or_else(|| "./clickrun.yaml".into());

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {}", path.display());
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e}");
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}
