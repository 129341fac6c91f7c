use anyhow::Result;
use chrono::Local;
use std::path::PathBuf;

use crate::commands::{CommandReport, archive_report};
use crate::intake::config::load_config;
use crate::intake::paths::resolve_paths;
use crate::intake::pipeline::{BatchOptions, run_batch};
use crate::intake::upload::{DirectoryUploader, Uploader};

#[derive(Debug, Clone, Default)]
pub struct IntakeRunOptions {
    pub keep_work: bool,
    pub log_file: Option<PathBuf>,
}

pub fn run(opts: &IntakeRunOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(paths.config_file())?;
    let mut report = CommandReport::new("intake-run");

    report.detail(format!("inbox_dir={}", paths.inbox_dir.display()));
    if let Some(log_file) = &opts.log_file {
        report.detail(format!("log_file={}", log_file.display()));
    }

    let mut uploader = DirectoryUploader::open(&paths.destination_dir)?;
    report.detail(format!("destination={}", uploader.destination()));

    let batch = run_batch(
        &paths,
        &cfg,
        &mut uploader,
        &BatchOptions {
            keep_work: opts.keep_work,
        },
        Local::now(),
    )?;

    report.detail(format!(
        "archives found={} reconciled={} failed={}",
        batch.archives_found,
        batch.archives.len() - batch.failed_archives().count(),
        batch.failed_archives().count()
    ));
    for outcome in &batch.archives {
        report.merge(archive_report(outcome));
    }

    report.detail(format!("uploaded={}", batch.uploaded));
    if batch.upload_failures > 0 {
        report.issue(format!("{} upload(s) failed", batch.upload_failures));
    }

    if let Some(manifest) = &batch.manifest {
        report.detail(format!(
            "manifest={} rows={}",
            manifest.path.display(),
            manifest.rows
        ));
        if let Some(receipt) = &manifest.upload {
            report.detail(format!(
                "manifest uploaded as {} (sha256 {})",
                receipt.stored_name, receipt.sha256
            ));
        }
    }

    if let Some(cleanup) = &batch.cleanup {
        report.detail(format!(
            "cleanup removed={} preserved={}",
            cleanup.removed, cleanup.preserved
        ));
        if cleanup.failed > 0 {
            report.issue(format!("cleanup could not remove {} path(s)", cleanup.failed));
        }
    }

    for note in batch.notes {
        report.detail(note);
    }
    for issue in batch.issues {
        report.issue(issue);
    }

    Ok(report)
}
