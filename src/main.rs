use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

use blockpatch::{logging::init_logging, EditReport, JobConfig, OccurrencePolicy};

/// Replace an exact block of text in a file, refusing to touch the file if
/// the block is not there.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to edit
    path: Option<PathBuf>,

    /// Exact text expected in the file
    #[arg(short, long, conflicts_with = "expected_file")]
    expected: Option<String>,

    /// Read the expected block from a file (verbatim, trailing newline included)
    #[arg(short = 'E', long)]
    expected_file: Option<PathBuf>,

    /// Text that replaces the expected block (may be empty)
    #[arg(short, long, conflicts_with = "replacement_file")]
    replacement: Option<String>,

    /// Read the replacement block from a file
    #[arg(short = 'R', long)]
    replacement_file: Option<PathBuf>,

    /// Which occurrences to replace: all, first or unique
    #[arg(short, long)]
    occurrences: Option<OccurrencePolicy>,

    /// Check the file and report, without writing
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Job file (json, yaml or toml); flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the edit report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> JobConfig {
        JobConfig {
            path: self.path.clone(),
            expected: self.expected.clone(),
            expected_file: self.expected_file.clone(),
            replacement: self.replacement.clone(),
            replacement_file: self.replacement_file.clone(),
            occurrences: self.occurrences,
            dry_run: self.dry_run,
        }
    }
}

fn run(cli: &Cli) -> Result<EditReport> {
    let job = match &cli.config {
        Some(config_path) => JobConfig::load(config_path)
            .with_context(|| format!("Failed to load job file {}", config_path.display()))?,
        None => JobConfig::default(),
    };

    let job = job.merge(cli.overrides()).resolve()?;
    debug!(
        "Resolved job for {} (policy: {}, dry run: {})",
        job.path.display(),
        job.options.policy,
        job.options.dry_run
    );

    match blockpatch::run_job(&job) {
        Ok(report) => Ok(report),
        Err(err) => {
            debug!(kind = err.kind(), "Substitution failed: {}", err);
            Err(err.into())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("Starting blockpatch v{}", blockpatch::version());

    match run(&cli) {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("error: failed to serialize report: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("{}", report);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
