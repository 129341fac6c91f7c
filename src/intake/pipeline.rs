use crate::error::WarnCode;
use crate::intake::audit;
use crate::intake::cleanup::{self, CleanupOutcome};
use crate::intake::config::{IndexConfig, IntakeConfig};
use crate::intake::extract::{archive_id, extract_archive, list_archives};
use crate::intake::index::{IndexRecord, read_index_file};
use crate::intake::lock::RunLock;
use crate::intake::manifest::{SortKeys, aggregate, manifest_stem, write_manifest};
use crate::intake::paths::IntakePaths;
use crate::intake::reconcile::{ArchiveOutcome, ArchiveStatus, Reconciler, RowIssueKind};
use crate::intake::upload::{UploadReceipt, Uploader};
use crate::intake::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub keep_work: bool,
}

#[derive(Debug, Clone)]
pub struct ManifestOutcome {
    pub path: PathBuf,
    pub rows: usize,
    pub upload: Option<UploadReceipt>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub archives_found: usize,
    pub archives: Vec<ArchiveOutcome>,
    pub uploaded: usize,
    pub upload_failures: usize,
    pub manifest: Option<ManifestOutcome>,
    pub cleanup: Option<CleanupOutcome>,
    pub notes: Vec<String>,
    pub issues: Vec<String>,
}

impl BatchOutcome {
    pub fn failed_archives(&self) -> impl Iterator<Item = &ArchiveOutcome> {
        self.archives.iter().filter(|a| !a.is_ok())
    }
}

fn prepare_work_dir(work_dir: &Path) -> Result<()> {
    if work_dir.exists() {
        fs::remove_dir_all(work_dir)
            .with_context(|| format!("failed to clear {}", work_dir.display()))?;
    }
    fs::create_dir_all(work_dir)
        .with_context(|| format!("failed to create {}", work_dir.display()))
}

fn emit_row_warnings(outcome: &ArchiveOutcome) {
    for issue in &outcome.row_issues {
        let (code, err) = match &issue.kind {
            RowIssueKind::FileMissing => (WarnCode::RowFileMissing, ""),
            RowIssueKind::RenameFailed(err) => (WarnCode::RowRenameFailed, err.as_str()),
            RowIssueKind::UnsafePath
            | RowIssueKind::UnsafeTarget
            | RowIssueKind::IndexReference => (WarnCode::RowSkipped, ""),
        };
        warn::emit(WarnEvent {
            code,
            stage: "reconcile",
            action: "rename",
            archive: &outcome.archive,
            item: &format!("row {}: {}", issue.row, issue.file_name),
            reason: issue.kind.reason(),
            err,
        });
    }
}

/// Extracts one archive into `work_dir` and reconciles it.
///
/// Never fails: archive-fatal problems become `ArchiveStatus::Failed` with no
/// rows and no upload candidates.
pub fn reconcile_archive(zip_path: &Path, work_dir: &Path, cfg: &IndexConfig) -> ArchiveOutcome {
    let archive = archive_id(zip_path);
    tracing::info!("processing archive {}", zip_path.display());

    let result = prepare_work_dir(work_dir)
        .and_then(|()| extract_archive(zip_path, work_dir))
        .and_then(|members| Reconciler::new(cfg).reconcile(&archive, work_dir, &members));

    match result {
        Ok(outcome) => {
            emit_row_warnings(&outcome);
            outcome
        }
        Err(err) => {
            let err_text = format!("{err:#}");
            warn::emit(WarnEvent {
                code: WarnCode::ArchiveFailed,
                stage: "reconcile",
                action: "skip-archive",
                archive: &archive,
                item: &zip_path.display().to_string(),
                reason: "archive-not-reconciled",
                err: &err_text,
            });
            ArchiveOutcome::failed(&archive, err_text)
        }
    }
}

fn upload_candidates(
    outcome: &ArchiveOutcome,
    uploader: &mut dyn Uploader,
    batch: &mut BatchOutcome,
) {
    for candidate in &outcome.upload_candidates {
        match uploader.upload(&candidate.path, &candidate.display_name) {
            Ok(receipt) => {
                batch.uploaded += 1;
                tracing::info!(
                    "uploaded `{}` as `{}` to {} ({} bytes, sha256 {})",
                    candidate.display_name,
                    receipt.stored_name,
                    uploader.destination(),
                    receipt.bytes,
                    receipt.sha256
                );
            }
            Err(err) => {
                batch.upload_failures += 1;
                warn::emit(WarnEvent {
                    code: WarnCode::UploadFailed,
                    stage: "upload",
                    action: "upload-file",
                    archive: &candidate.archive,
                    item: &candidate.display_name,
                    reason: "upload-failed",
                    err: &format!("{err:#}"),
                });
            }
        }
    }
}

fn audit_archive(paths: &IntakePaths, outcome: &ArchiveOutcome) {
    let (status, message) = match &outcome.status {
        ArchiveStatus::Ok => (
            "ok",
            format!(
                "rows={} renamed={} row_issues={} upload_candidates={}",
                outcome.record.as_ref().map_or(0, |r| r.rows.len()),
                outcome.renames.len(),
                outcome.row_issues.len(),
                outcome.upload_candidates.len()
            ),
        ),
        ArchiveStatus::Failed(reason) => ("failed", reason.clone()),
    };
    audit::record(paths, "reconcile", status, &outcome.archive, &message);
}

fn write_and_upload_manifest(
    paths: &IntakePaths,
    cfg: &IntakeConfig,
    records: &[IndexRecord],
    uploader: &mut dyn Uploader,
    now: &DateTime<Local>,
    batch: &mut BatchOutcome,
) -> Result<()> {
    let manifest = match aggregate(records, &SortKeys::from_index(&cfg.index)) {
        Ok(manifest) => manifest,
        Err(err) => {
            audit::record(paths, "manifest", "failed", "header", &err.to_string());
            return Err(err.into());
        }
    };
    if manifest.is_empty() {
        batch
            .issues
            .push("no archive was reconciled; manifest not written".to_string());
        return Ok(());
    }

    let stem = manifest_stem(&cfg.manifest.prefix, now);
    let path = write_manifest(
        &manifest,
        &paths.consolidated_dir,
        &stem,
        cfg.index.delimiter_byte(),
        &cfg.manifest,
    )?;
    tracing::info!(
        "aggregated {} rows into manifest {}",
        manifest.rows.len(),
        path.display()
    );
    audit::record(
        paths,
        "manifest",
        "ok",
        &path.display().to_string(),
        &format!("rows={}", manifest.rows.len()),
    );

    let display_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&stem)
        .to_string();
    let upload = match uploader.upload(&path, &display_name) {
        Ok(receipt) => {
            batch.uploaded += 1;
            Some(receipt)
        }
        Err(err) => {
            batch.upload_failures += 1;
            warn::emit(WarnEvent {
                code: WarnCode::ManifestFailed,
                stage: "upload",
                action: "upload-manifest",
                archive: "",
                item: &display_name,
                reason: "upload-failed",
                err: &format!("{err:#}"),
            });
            None
        }
    };

    batch.manifest = Some(ManifestOutcome {
        path,
        rows: manifest.rows.len(),
        upload,
    });
    Ok(())
}

fn cleanup_workspace(paths: &IntakePaths, processed: &[PathBuf]) -> CleanupOutcome {
    let mut out = CleanupOutcome::default();
    cleanup::remove_files(processed, &mut out);
    cleanup::remove_dir(&paths.extraction_dir, &mut out);
    cleanup::clean_dir_preserving_logs(&paths.consolidated_dir, &mut out);
    audit::record(
        paths,
        "cleanup",
        if out.failed == 0 { "ok" } else { "partial" },
        &paths.intake_home.display().to_string(),
        &format!(
            "removed={} preserved={} failed={}",
            out.removed, out.preserved, out.failed
        ),
    );
    out
}

/// Reconciles every archive in the inbox, uploads the results and writes the
/// run manifest. Only a header mismatch (or a workspace-level I/O failure)
/// aborts the run.
pub fn run_batch(
    paths: &IntakePaths,
    cfg: &IntakeConfig,
    uploader: &mut dyn Uploader,
    opts: &BatchOptions,
    now: DateTime<Local>,
) -> Result<BatchOutcome> {
    let lock = RunLock::acquire(&paths.lock_file())?;
    tracing::debug!("holding run lock {}", lock.path().display());
    let mut batch = BatchOutcome::default();

    let archives = list_archives(&paths.inbox_dir)?;
    batch.archives_found = archives.len();
    if archives.is_empty() {
        batch
            .issues
            .push(format!("no zip archives found in {}", paths.inbox_dir.display()));
        return Ok(batch);
    }

    let mut processed = Vec::new();
    for zip_path in &archives {
        let work_dir = paths.extraction_dir.join(archive_id(zip_path));
        let outcome = reconcile_archive(zip_path, &work_dir, &cfg.index);
        audit_archive(paths, &outcome);
        if outcome.is_ok() {
            upload_candidates(&outcome, uploader, &mut batch);
            processed.push(zip_path.clone());
        }
        batch.archives.push(outcome);
    }

    let records: Vec<IndexRecord> = batch
        .archives
        .iter()
        .filter_map(|a| a.record.clone())
        .collect();
    write_and_upload_manifest(paths, cfg, &records, uploader, &now, &mut batch)?;

    if opts.keep_work || !cfg.cleanup.enabled {
        batch.notes.push("cleanup skipped by request".to_string());
    } else if batch.upload_failures > 0 {
        batch.issues.push(format!(
            "cleanup skipped: {} upload(s) failed; working files kept",
            batch.upload_failures
        ));
    } else {
        batch.cleanup = Some(cleanup_workspace(paths, &processed));
    }

    Ok(batch)
}

/// Aggregates standalone index sheets (already extracted) into a manifest.
pub fn aggregate_files(
    files: &[PathBuf],
    out_dir: &Path,
    cfg: &IntakeConfig,
    now: DateTime<Local>,
) -> Result<Option<ManifestOutcome>> {
    let mut records = Vec::with_capacity(files.len());
    for file in files {
        let archive = archive_id(file);
        let member = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        records.push(read_index_file(
            file,
            cfg.index.delimiter_byte(),
            &archive,
            &member,
        )?);
    }

    let manifest = aggregate(&records, &SortKeys::from_index(&cfg.index))?;
    if manifest.is_empty() {
        return Ok(None);
    }
    let stem = manifest_stem(&cfg.manifest.prefix, &now);
    let path = write_manifest(
        &manifest,
        out_dir,
        &stem,
        cfg.index.delimiter_byte(),
        &cfg.manifest,
    )?;
    Ok(Some(ManifestOutcome {
        path,
        rows: manifest.rows.len(),
        upload: None,
    }))
}
