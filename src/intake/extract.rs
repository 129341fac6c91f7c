use crate::intake::reconcile::normalize_member_name;
use anyhow::{Context, Result, bail};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Identifier of an archive: its file stem (`batch_01.zip` -> `batch_01`).
pub fn archive_id(zip_path: &Path) -> String {
    zip_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive")
        .to_string()
}

pub fn is_zip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// All `*.zip` files directly inside `dir`, sorted by file name.
pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && is_zip_path(&path) {
            out.push(path);
        }
    }
    out.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(out)
}

/// Extracts every file member into `dest` and returns their names in archive order.
pub fn extract_archive(zip_path: &Path, dest: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(zip_path)
        .with_context(|| format!("failed to open zip file: {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("failed to read zip archive: {}", zip_path.display()))?;

    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;

    let mut members = Vec::with_capacity(archive.len());
    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx).with_context(|| {
            format!(
                "failed to read zip entry index {idx} from {}",
                zip_path.display()
            )
        })?;
        if entry.is_dir() || entry.name().ends_with('/') {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            bail!(
                "zip entry `{}` in {} escapes the extraction directory",
                entry.name(),
                zip_path.display()
            );
        };

        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut out = fs::File::create(&target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        io::copy(&mut entry, &mut out).with_context(|| {
            format!(
                "failed to extract `{}` from {}",
                entry.name(),
                zip_path.display()
            )
        })?;

        members.push(normalize_member_name(&relative.to_string_lossy()));
    }

    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).expect("create zip");
        let mut zip = ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default())
                .expect("start file");
            zip.write_all(content.as_bytes()).expect("write entry");
        }
        zip.finish().expect("finish zip");
    }

    #[test]
    fn extracts_members_in_archive_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let zip_path = tmp.path().join("batch_01.zip");
        build_zip(
            &zip_path,
            &[("z.jpg", "z"), ("index.csv", "File name\n"), ("sub/a.jpg", "a")],
        );

        let dest = tmp.path().join("out");
        let members = extract_archive(&zip_path, &dest).expect("extract");

        assert_eq!(members, vec!["z.jpg", "index.csv", "sub/a.jpg"]);
        assert_eq!(fs::read(dest.join("sub/a.jpg")).expect("read"), b"a");
        assert_eq!(archive_id(&zip_path), "batch_01");
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let zip_path = tmp.path().join("broken.zip");
        fs::write(&zip_path, b"not a zip at all").expect("write");

        let err = extract_archive(&zip_path, &tmp.path().join("out")).expect_err("corrupt");
        assert!(format!("{err:#}").contains("failed to read zip archive"));
    }

    #[test]
    fn lists_only_zip_files_sorted() {
        let tmp = tempfile::tempdir().expect("tempdir");
        for name in ["b.zip", "a.ZIP", "notes.txt"] {
            fs::write(tmp.path().join(name), b"").expect("write");
        }
        let names: Vec<_> = list_archives(tmp.path())
            .expect("list")
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["a.ZIP", "b.zip"]);
        assert!(list_archives(&tmp.path().join("missing")).expect("list").is_empty());
    }
}
