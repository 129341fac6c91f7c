pub mod intake_aggregate;
pub mod intake_reconcile;
pub mod intake_run;
pub mod intake_status;

use crate::intake::reconcile::{ArchiveOutcome, ArchiveStatus};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }
}

/// Per-archive lines shared by `run` and `reconcile`. Row issues are details:
/// they do not stop the archive from being reconciled.
pub fn archive_report(outcome: &ArchiveOutcome) -> CommandReport {
    let mut report = CommandReport::new(format!("archive {}", outcome.archive));
    if let ArchiveStatus::Failed(reason) = &outcome.status {
        report.issue(format!("archive {} failed: {reason}", outcome.archive));
        return report;
    }

    let rows = outcome.record.as_ref().map_or(0, |r| r.rows.len());
    report.detail(format!(
        "archive {}: rows={rows} renamed={} files={}",
        outcome.archive,
        outcome.renames.len(),
        outcome.upload_candidates.len()
    ));
    for rename in &outcome.renames {
        report.detail(format!("  {} -> {}", rename.from, rename.to));
    }
    for issue in &outcome.row_issues {
        report.detail(format!(
            "  row {} `{}`: {}",
            issue.row,
            issue.file_name,
            issue.kind.reason()
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_first_failure() {
        let mut base = CommandReport::new("intake-run");
        base.detail("one");
        let mut failed = CommandReport::new("archive x");
        failed.issue("archive x failed: no index");

        base.merge(failed);
        base.merge(CommandReport::new("archive y"));

        assert!(!base.ok);
        assert_eq!(base.details, vec!["one"]);
        assert_eq!(base.issues.len(), 1);
    }

    #[test]
    fn failed_archive_is_an_issue() {
        let outcome = ArchiveOutcome::failed("b_batch", "no index member found");
        let report = archive_report(&outcome);
        assert!(!report.ok);
        assert_eq!(report.issues, vec!["archive b_batch failed: no index member found"]);
    }
}
