use crate::error::IntakeError;
use crate::intake::collision::resolve_parts;
use crate::intake::config::{IndexConfig, ManifestConfig};
use crate::intake::index::{IndexRecord, IndexRow, column_position};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

/// Run-wide union of every reconciled index sheet, sorted for review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub header: Vec<String>,
    pub rows: Vec<IndexRow>,
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }
}

/// Column names the manifest is ordered by: last name, preferred name, file name.
#[derive(Debug, Clone)]
pub struct SortKeys {
    pub last: String,
    pub preferred: String,
    pub file_name: String,
}

impl SortKeys {
    pub fn from_index(cfg: &IndexConfig) -> Self {
        Self {
            last: cfg.last_column.clone(),
            preferred: cfg.preferred_column.clone(),
            file_name: cfg.file_name_column.clone(),
        }
    }
}

/// Concatenates all rows and stable-sorts them case-insensitively.
///
/// Every header must equal the first one field for field, otherwise the whole
/// aggregation fails.
pub fn aggregate(records: &[IndexRecord], keys: &SortKeys) -> Result<Manifest, IntakeError> {
    let Some(first) = records.first() else {
        return Ok(Manifest::default());
    };
    let header = first.header.clone();

    let mut rows = Vec::with_capacity(records.iter().map(|r| r.rows.len()).sum());
    for record in records {
        if record.header != header {
            return Err(IntakeError::HeaderMismatch {
                archive: record.archive.clone(),
                expected: header,
                found: record.header.clone(),
            });
        }
        rows.extend(record.rows.iter().cloned());
    }

    let last = column_position(&header, &keys.last);
    let preferred = column_position(&header, &keys.preferred);
    let file_name = column_position(&header, &keys.file_name);
    rows.sort_by_cached_key(|row| {
        (
            row.get(last).to_lowercase(),
            row.get(preferred).to_lowercase(),
            row.get(file_name).to_lowercase(),
        )
    });

    Ok(Manifest { header, rows })
}

pub fn manifest_stem<Tz>(prefix: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{prefix}-{}", now.format("%Y%m%dT%H%M"))
}

/// Writes the manifest into `dir` and returns its path.
///
/// An existing file is never replaced; a ` (n)` suffix is added instead.
pub fn write_manifest(
    manifest: &Manifest,
    dir: &Path,
    stem: &str,
    delimiter: u8,
    cfg: &ManifestConfig,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let name = resolve_parts(stem, ".csv", |candidate| dir.join(candidate).exists());
    let path = dir.join(name);
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(file);

    let provenance = cfg.provenance_column.as_deref();
    let mut header = manifest.header.clone();
    if let Some(column) = provenance {
        header.push(column.to_string());
    }
    writer
        .write_record(&header)
        .with_context(|| format!("failed to write header to {}", path.display()))?;

    for row in &manifest.rows {
        let mut values = row.values.clone();
        if provenance.is_some() {
            values.resize(manifest.header.len().max(values.len()), String::new());
            values.push(row.archive.clone());
        }
        writer
            .write_record(&values)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;

    Ok(path)
}
