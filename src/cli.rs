use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::intake_aggregate::{self, IntakeAggregateOptions};
use crate::commands::intake_reconcile::{self, IntakeReconcileOptions};
use crate::commands::intake_run::{self, IntakeRunOptions};
use crate::commands::{CommandReport, intake_status};
use crate::intake::paths::resolve_paths;
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "intake",
    version,
    about = "Reconcile delivered ZIP batches against their index sheets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process every archive in the inbox, upload the results and write the manifest.
    Run(RunArgs),
    /// Reconcile one archive into a work directory without uploading.
    Reconcile(ReconcileArgs),
    /// Build a manifest from index sheets already on disk.
    Aggregate(AggregateArgs),
    /// Show resolved paths, configuration and pending archives.
    Status(OutputArgs),
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Leave extracted files, the manifest and processed archives in place.
    #[arg(long)]
    keep_work: bool,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct ReconcileArgs {
    #[arg(long)]
    archive: PathBuf,
    /// Keep the reconciled files under `<dir>/<archive id>`.
    #[arg(long)]
    work_dir: Option<PathBuf>,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct AggregateArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Defaults to the consolidated directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[command(flatten)]
    output: OutputArgs,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "completed with issues" }
    );
    for line in &report.details {
        println!("  {line}");
    }
    for line in &report.issues {
        println!("  issue: {line}");
    }
    Ok(())
}

/// Parses arguments, runs the command and prints its report. Returns whether
/// the report came back without issues.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();

    let (report, json) = match cli.command {
        Command::Run(args) => {
            let paths = resolve_paths()?;
            let log_file = logging::init(Some(&paths.logs_dir))?;
            let opts = IntakeRunOptions {
                keep_work: args.keep_work,
                log_file,
            };
            (intake_run::run(&opts)?, args.output.json)
        }
        Command::Reconcile(args) => {
            logging::init(None)?;
            let opts = IntakeReconcileOptions {
                archive: args.archive,
                work_dir: args.work_dir,
            };
            (intake_reconcile::run(&opts)?, args.output.json)
        }
        Command::Aggregate(args) => {
            logging::init(None)?;
            let opts = IntakeAggregateOptions {
                files: args.files,
                out_dir: args.out_dir,
            };
            (intake_aggregate::run(&opts)?, args.output.json)
        }
        Command::Status(output) => {
            logging::init(None)?;
            (intake_status::run()?, output.json)
        }
    };

    print_report(&report, json)?;
    Ok(report.ok)
}
