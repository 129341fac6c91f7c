use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("no index sheet found (no member header contains `{marker}`)")]
    NoIndexFound { marker: String },
    #[error("ambiguous index sheet: {} candidates ({})", candidates.len(), candidates.join(", "))]
    AmbiguousIndex { candidates: Vec<String> },
    #[error("index sheet `{member}` is missing required column `{column}`")]
    MissingColumn { member: String, column: String },
    #[error("index sheet `{member}` has no header line")]
    EmptyIndex { member: String },
    #[error(
        "header mismatch in archive `{archive}`: expected [{}], found [{}]",
        expected.join(", "),
        found.join(", ")
    )]
    HeaderMismatch {
        archive: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("another intake run holds the lock at {0}")]
    RunLocked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnCode {
    ArchiveFailed,
    RowFileMissing,
    RowRenameFailed,
    RowSkipped,
    UploadFailed,
    ManifestFailed,
    CleanupFailed,
}

impl WarnCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArchiveFailed => "ARCHIVE_FAILED",
            Self::RowFileMissing => "ROW_FILE_MISSING",
            Self::RowRenameFailed => "ROW_RENAME_FAILED",
            Self::RowSkipped => "ROW_SKIPPED",
            Self::UploadFailed => "UPLOAD_FAILED",
            Self::ManifestFailed => "MANIFEST_FAILED",
            Self::CleanupFailed => "CLEANUP_FAILED",
        }
    }
}
