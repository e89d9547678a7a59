//! TreeBackup CLI - concurrent incremental file-tree backup
//!
//! Reads a job file, mirrors every committed source directory into its
//! backup root, and prints a summary.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};
use treebackup::config::{CliArgs, EngineConfig, JobPlan, OutputFormat};
use treebackup::core::BackupEngine;
use treebackup::error::BackupError;

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn main() -> ExitCode {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging
    let filter = init_logging(&args);

    match run(&args, filter.as_ref()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Install the fmt subscriber. Returns a reload handle unless `RUST_LOG`
/// decides the filter.
fn init_logging(args: &CliArgs) -> Option<FilterHandle> {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(level_for(args.verbose, args.quiet)), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    if from_env {
        None
    } else {
        Some(handle)
    }
}

fn level_for(verbose: u8, quiet: bool) -> &'static str {
    match (verbose, quiet) {
        (0, true) => "error",
        (0, false) => "warn",
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    }
}

fn run(args: &CliArgs, filter: Option<&FilterHandle>) -> anyhow::Result<ExitCode> {
    let Some(job_file) = &args.job_file else {
        eprintln!("Usage: treebackup <JOB_FILE> [OPTIONS]");
        eprintln!("       treebackup --help for the job file format");
        eprintln!();
        eprintln!("{}", CliArgs::command().render_usage());
        return Ok(ExitCode::FAILURE);
    };

    // Build configuration
    let config = EngineConfig::from_cli(args).map_err(BackupError::ConfigError)?;

    tracing::info!("Reading job file: {}", job_file.display());
    let plan = JobPlan::from_file(job_file)
        .with_context(|| format!("Failed to open job file {}", job_file.display()))?;

    // The job file's `v` directive raises console logging unless -v or RUST_LOG already chose
    if plan.verbose && args.verbose == 0 {
        if let Some(handle) = filter {
            if let Err(e) = handle.reload(EnvFilter::new("info")) {
                tracing::warn!("Could not raise log level: {}", e);
            }
        }
    }

    if plan.startup_errors() > 0 {
        eprintln!("Encountered {} start up error(s).", plan.startup_errors());
    }

    let engine = BackupEngine::new(config);
    let report = match engine.run(&plan) {
        Ok(report) => report,
        Err(BackupError::NoCommits) => {
            eprintln!("Error: no backups committed!");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Backup run failed"),
    };

    if !args.quiet {
        match args.output_format {
            OutputFormat::Text => report.print_summary(),
            OutputFormat::Json => println!("{}", report.to_json()?),
        }
    }

    Ok(ExitCode::SUCCESS)
}
