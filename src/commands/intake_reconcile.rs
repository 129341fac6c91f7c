use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::commands::{CommandReport, archive_report};
use crate::intake::config::load_config;
use crate::intake::extract::archive_id;
use crate::intake::paths::resolve_paths;
use crate::intake::pipeline::reconcile_archive;

#[derive(Debug, Clone)]
pub struct IntakeReconcileOptions {
    pub archive: PathBuf,
    pub work_dir: Option<PathBuf>,
}

/// Reconciles a single archive without uploading anything. Without
/// `--work-dir` the extracted files are discarded when the command ends.
pub fn run(opts: &IntakeReconcileOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(paths.config_file())?;
    let mut report = CommandReport::new("intake-reconcile");

    let scratch;
    let parent = match &opts.work_dir {
        Some(dir) => dir.clone(),
        None => {
            scratch = tempfile::tempdir().context("failed to create scratch directory")?;
            scratch.path().to_path_buf()
        }
    };
    let work_dir = parent.join(archive_id(&opts.archive));

    let outcome = reconcile_archive(&opts.archive, &work_dir, &cfg.index);
    if opts.work_dir.is_some() && outcome.is_ok() {
        report.detail(format!("work_dir={}", work_dir.display()));
    }
    report.merge(archive_report(&outcome));
    for candidate in &outcome.upload_candidates {
        report.detail(format!("  upload: {}", candidate.display_name));
    }

    Ok(report)
}
