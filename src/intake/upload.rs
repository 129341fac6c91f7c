use crate::intake::collision::resolve_collision;
use crate::intake::identity::extension_of;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// Destination for renamed files and the run manifest.
pub trait Uploader {
    fn destination(&self) -> String;

    fn upload(&mut self, local: &Path, display_name: &str) -> Result<UploadReceipt>;
}

/// Copies uploads into a local folder (for example a synced shared drive).
///
/// Names already present are never replaced: clashes get a ` (n)` suffix.
#[derive(Debug)]
pub struct DirectoryUploader {
    root: PathBuf,
    taken: BTreeSet<String>,
}

impl DirectoryUploader {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;
        let mut taken = BTreeSet::new();
        for entry in fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))? {
            if let Some(name) = entry?.file_name().to_str() {
                taken.insert(name.to_string());
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            taken,
        })
    }
}

fn file_hash(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

impl Uploader for DirectoryUploader {
    fn destination(&self) -> String {
        self.root.display().to_string()
    }

    fn upload(&mut self, local: &Path, display_name: &str) -> Result<UploadReceipt> {
        if display_name.is_empty() || display_name.contains(['/', '\\']) {
            bail!("invalid upload name `{display_name}`");
        }

        // The real extension comes from the local file, not from dots in the display name.
        let extension = local
            .file_name()
            .and_then(|n| n.to_str())
            .map(extension_of)
            .unwrap_or_default();
        let stored_name = resolve_collision(display_name, &extension, &self.taken);
        let stored_path = self.root.join(&stored_name);

        let mut source =
            fs::File::open(local).with_context(|| format!("failed to open {}", local.display()))?;
        let mut target = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&stored_path)
            .with_context(|| format!("failed to create {}", stored_path.display()))?;
        let bytes = io::copy(&mut source, &mut target)
            .with_context(|| format!("failed to copy {}", local.display()))?;
        self.taken.insert(stored_name.clone());

        Ok(UploadReceipt {
            sha256: file_hash(&stored_path)?,
            stored_name,
            stored_path,
            bytes,
        })
    }
}
