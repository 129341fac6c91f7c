use crate::error::WarnCode;
use crate::intake::warn::{self, WarnEvent};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupOutcome {
    pub removed: usize,
    pub preserved: usize,
    pub failed: usize,
}

fn is_run_log(name: &str) -> bool {
    name.starts_with("log-") && name.ends_with(".log")
}

fn report_failure(out: &mut CleanupOutcome, path: &Path, err: &std::io::Error) {
    out.failed += 1;
    warn::emit(WarnEvent {
        code: WarnCode::CleanupFailed,
        stage: "cleanup",
        action: "remove",
        archive: "",
        item: &path.display().to_string(),
        reason: "remove-failed",
        err: &err.to_string(),
    });
}

fn remove_path(path: &Path, out: &mut CleanupOutcome) {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => {
            out.removed += 1;
            tracing::info!("deleted {}", path.display());
        }
        Err(err) => report_failure(out, path, &err),
    }
}

/// Removes `dir` and everything below it. A missing directory is not an error.
pub fn remove_dir(dir: &Path, out: &mut CleanupOutcome) {
    if dir.exists() {
        remove_path(dir, out);
    }
}

/// Empties `dir` but keeps `log-*.log` files in place.
pub fn clean_dir_preserving_logs(dir: &Path, out: &mut CleanupOutcome) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
        Err(err) => {
            report_failure(out, dir, &err);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if entry.file_name().to_str().is_some_and(is_run_log) {
            out.preserved += 1;
            tracing::info!("preserving log file {}", path.display());
            continue;
        }
        remove_path(&path, out);
    }
}

/// Removes the given files (processed archives); missing files are skipped.
pub fn remove_files(files: &[PathBuf], out: &mut CleanupOutcome) {
    for path in files.iter().filter(|p| p.exists()) {
        remove_path(path, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_run_logs_only() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path();
        fs::write(dir.join("log-20250101T000000.log"), "x").expect("write");
        fs::write(dir.join("photos_uploaded-20250101T0000.csv"), "x").expect("write");
        fs::write(dir.join("log-notes.txt"), "x").expect("write");
        fs::create_dir_all(dir.join("nested/deeper")).expect("mkdir");

        let mut out = CleanupOutcome::default();
        clean_dir_preserving_logs(dir, &mut out);

        assert_eq!(out.preserved, 1);
        assert_eq!(out.removed, 3);
        assert_eq!(out.failed, 0);
        assert!(dir.join("log-20250101T000000.log").exists());
        assert!(!dir.join("nested").exists());
    }

    #[test]
    fn missing_directories_are_ignored() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut out = CleanupOutcome::default();
        remove_dir(&tmp.path().join("nope"), &mut out);
        clean_dir_preserving_logs(&tmp.path().join("nope"), &mut out);
        assert_eq!((out.removed, out.failed), (0, 0));
    }

    #[test]
    fn removes_whole_tree() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let work = tmp.path().join("extract/batch");
        fs::create_dir_all(&work).expect("mkdir");
        fs::write(work.join("a.jpg"), "x").expect("write");

        let mut out = CleanupOutcome::default();
        remove_dir(&tmp.path().join("extract"), &mut out);
        assert_eq!(out.removed, 1);
        assert!(!tmp.path().join("extract").exists());
    }
}
