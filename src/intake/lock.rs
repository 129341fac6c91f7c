use crate::error::IntakeError;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Exclusive lock on the intake home, held for the duration of one run.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(IntakeError::RunLocked(path.display().to_string()).into());
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether another process holds the lock. Opens the file read-only and
    /// never creates or rewrites it.
    pub fn is_held(path: &Path) -> Result<bool> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to open {}", path.display()));
            }
        };
        if file.try_lock_shared().is_err() {
            return Ok(true);
        }
        let _ = FileExt::unlock(&file);
        Ok(false)
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("intake.lock");

        let held = RunLock::acquire(&path).expect("first lock");
        let err = RunLock::acquire(&path).expect_err("second lock");
        assert!(err.to_string().contains("holds the lock"));
        assert_eq!(held.path(), path.as_path());

        drop(held);
        assert!(RunLock::acquire(&path).is_ok());
    }

    #[test]
    fn held_check_does_not_touch_the_lock_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("intake.lock");
        assert!(!RunLock::is_held(&path).expect("check"));
        assert!(!path.exists());

        let held = RunLock::acquire(&path).expect("lock");
        assert!(RunLock::is_held(&path).expect("check"));
        drop(held);

        fs::write(&path, "4242\n").expect("write pid");
        assert!(!RunLock::is_held(&path).expect("check"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "4242\n");
    }
}
