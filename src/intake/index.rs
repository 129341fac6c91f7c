use crate::error::IntakeError;
use crate::intake::config::IndexConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

const FIRST_LINE_LIMIT: u64 = 64 * 1024;
const BOM: char = '\u{feff}';

/// One data row of an index sheet, tagged with the archive it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRow {
    pub archive: String,
    pub values: Vec<String>,
}

impl IndexRow {
    pub fn get(&self, column: Option<usize>) -> &str {
        column
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub archive: String,
    pub member: String,
    pub header: Vec<String>,
    pub rows: Vec<IndexRow>,
}

impl IndexRecord {
    pub fn column(&self, name: &str) -> Option<usize> {
        column_position(&self.header, name)
    }
}

pub fn column_position(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h == name)
}

/// Positions of the columns the reconciler cannot work without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexColumns {
    pub file_name: usize,
    pub id_number: usize,
    pub preferred: usize,
    pub last: usize,
}

impl IndexColumns {
    pub fn resolve(record: &IndexRecord, cfg: &IndexConfig) -> Result<Self, IntakeError> {
        let find = |name: &str| {
            record.column(name).ok_or_else(|| IntakeError::MissingColumn {
                member: record.member.clone(),
                column: name.to_string(),
            })
        };
        Ok(Self {
            file_name: find(&cfg.file_name_column)?,
            id_number: find(&cfg.id_column)?,
            preferred: find(&cfg.preferred_column)?,
            last: find(&cfg.last_column)?,
        })
    }
}

/// Reads the first physical line of a file, without its line terminator.
pub fn read_first_line(path: &Path) -> io::Result<Option<String>> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file.take(FIRST_LINE_LIMIT));
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    let line =
        String::from_utf8(buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    Ok(Some(line))
}

/// Picks the single tabular member whose first line contains the index marker.
///
/// Unreadable candidates are logged and skipped. Zero or several matches are
/// archive-fatal.
pub fn locate_index<F>(
    members: &[String],
    cfg: &IndexConfig,
    mut first_line: F,
) -> Result<String, IntakeError>
where
    F: FnMut(&str) -> io::Result<Option<String>>,
{
    let mut candidates = Vec::new();
    for member in members.iter().filter(|m| cfg.is_tabular_member(m)) {
        match first_line(member) {
            Ok(Some(line)) if line.contains(&cfg.marker) => candidates.push(member.clone()),
            Ok(_) => {}
            Err(err) => tracing::warn!("cannot read header of member `{member}`: {err}"),
        }
    }

    match candidates.len() {
        0 => Err(IntakeError::NoIndexFound {
            marker: cfg.marker.clone(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(IntakeError::AmbiguousIndex { candidates }),
    }
}

/// Parses a delimited sheet: first non-empty line is the header, the rest are rows.
///
/// Short rows are padded with empty values so every row covers the header.
pub fn read_index<R: Read>(
    source: R,
    delimiter: u8,
    archive: &str,
    member: &str,
) -> Result<IndexRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let header: Vec<String> = reader
        .headers()
        .with_context(|| format!("failed to read header of `{member}`"))?
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            if idx == 0 {
                cell.trim_start_matches(BOM).to_string()
            } else {
                cell.to_string()
            }
        })
        .collect();
    if header.is_empty() || header.iter().all(String::is_empty) {
        return Err(IntakeError::EmptyIndex {
            member: member.to_string(),
        }
        .into());
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("failed to parse row {} of `{member}`", line + 1))?;
        let mut values: Vec<String> = record.iter().map(ToOwned::to_owned).collect();
        if values.len() < header.len() {
            values.resize(header.len(), String::new());
        }
        rows.push(IndexRow {
            archive: archive.to_string(),
            values,
        });
    }

    Ok(IndexRecord {
        archive: archive.to_string(),
        member: member.to_string(),
        header,
        rows,
    })
}

pub fn read_index_file(
    path: &Path,
    delimiter: u8,
    archive: &str,
    member: &str,
) -> Result<IndexRecord> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_index(file, delimiter, archive, member)
}
