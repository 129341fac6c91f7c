use crate::intake::collision::{resolve_parts, split_known_extension};
use crate::intake::config::IndexConfig;
use crate::intake::identity::{IdentityResolver, extension_of};
use crate::intake::index::{
    IndexColumns, IndexRecord, locate_index, read_first_line, read_index_file,
};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// A member materialized in the archive's working directory.
#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    pub member: String,
    pub path: PathBuf,
    pub is_index: bool,
    pub renamed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadCandidate {
    pub archive: String,
    pub path: PathBuf,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RowIssueKind {
    FileMissing,
    UnsafePath,
    UnsafeTarget,
    IndexReference,
    RenameFailed(String),
}

impl RowIssueKind {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::FileMissing => "file-not-extracted",
            Self::UnsafePath => "file-name-escapes-archive",
            Self::UnsafeTarget => "canonical-name-escapes-archive",
            Self::IndexReference => "row-references-index-sheet",
            Self::RenameFailed(_) => "rename-failed",
        }
    }
}

/// A row that kept its manifest entry but whose file was not renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// 1-based data row number within the index sheet.
    pub row: usize,
    pub file_name: String,
    pub kind: RowIssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ArchiveStatus {
    Ok,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub archive: String,
    pub status: ArchiveStatus,
    pub upload_candidates: Vec<UploadCandidate>,
    pub record: Option<IndexRecord>,
    pub renames: Vec<Rename>,
    pub row_issues: Vec<RowIssue>,
}

impl ArchiveOutcome {
    pub fn failed(archive: &str, reason: impl Into<String>) -> Self {
        Self {
            archive: archive.to_string(),
            status: ArchiveStatus::Failed(reason.into()),
            upload_candidates: Vec::new(),
            record: None,
            renames: Vec::new(),
            row_issues: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ArchiveStatus::Ok
    }
}

pub fn normalize_member_name(name: &str) -> String {
    name.replace('\\', "/")
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}

fn is_safe_relative(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// A rename target must stay a plain file name in the archive's working directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.contains(['/', '\\'])
        && matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        )
}

/// Renames one archive's extracted files after its index sheet.
pub struct Reconciler<'a> {
    cfg: &'a IndexConfig,
    identity: IdentityResolver,
}

impl<'a> Reconciler<'a> {
    pub fn new(cfg: &'a IndexConfig) -> Self {
        Self {
            cfg,
            identity: IdentityResolver::new(cfg.placeholder.clone()),
        }
    }

    /// Archive-fatal conditions come back as `Err`; row problems are
    /// collected in the outcome.
    pub fn reconcile(
        &self,
        archive: &str,
        extraction_dir: &Path,
        members: &[String],
    ) -> Result<ArchiveOutcome> {
        let index_member = locate_index(members, self.cfg, |member| {
            read_first_line(&extraction_dir.join(member))
        })?;
        tracing::info!("archive `{archive}`: index sheet is `{index_member}`");

        let record = read_index_file(
            &extraction_dir.join(&index_member),
            self.cfg.delimiter_byte(),
            archive,
            &index_member,
        )?;
        let columns = IndexColumns::resolve(&record, self.cfg)?;

        let mut seen = BTreeSet::new();
        let mut entries: Vec<ExtractedEntry> = members
            .iter()
            .filter(|member| seen.insert(member.as_str()))
            .map(|member| ExtractedEntry {
                member: member.clone(),
                path: extraction_dir.join(member),
                is_index: *member == index_member,
                renamed: false,
            })
            .collect();

        let mut committed: BTreeSet<String> = BTreeSet::new();
        let mut renames = Vec::new();
        let mut row_issues = Vec::new();

        for (idx, row) in record.rows.iter().enumerate() {
            let file_name = normalize_member_name(row.get(Some(columns.file_name)));
            let issue = |kind: RowIssueKind| RowIssue {
                row: idx + 1,
                file_name: file_name.clone(),
                kind,
            };

            if !is_safe_relative(&file_name) {
                row_issues.push(issue(RowIssueKind::UnsafePath));
                continue;
            }
            if file_name == index_member {
                row_issues.push(issue(RowIssueKind::IndexReference));
                continue;
            }

            let source = extraction_dir.join(&file_name);
            if !source.is_file() {
                row_issues.push(issue(RowIssueKind::FileMissing));
                continue;
            }

            let extension = extension_of(&file_name);
            let canonical = self.identity.canonical_name(
                row.get(Some(columns.last)),
                row.get(Some(columns.preferred)),
                row.get(Some(columns.id_number)),
                &extension,
            );
            // Suffixes go before the original extension, even if the names contain dots.
            let (stem, extension) = split_known_extension(&canonical, &extension);
            let resolved = resolve_parts(stem, extension, |name| {
                if committed.contains(name) {
                    return true;
                }
                let target = extraction_dir.join(name);
                target != source && target.exists()
            });
            if !is_plain_file_name(&resolved) {
                row_issues.push(issue(RowIssueKind::UnsafeTarget));
                continue;
            }

            let target = extraction_dir.join(&resolved);
            if let Err(err) = fs::rename(&source, &target) {
                row_issues.push(issue(RowIssueKind::RenameFailed(err.to_string())));
                continue;
            }
            tracing::info!("archive `{archive}`: renamed `{file_name}` to `{resolved}`");

            match entries.iter_mut().find(|e| e.member == file_name && !e.renamed) {
                Some(entry) => {
                    entry.path = target;
                    entry.renamed = true;
                }
                None => entries.push(ExtractedEntry {
                    member: file_name.clone(),
                    path: target,
                    is_index: false,
                    renamed: true,
                }),
            }
            renames.push(Rename {
                from: file_name.clone(),
                to: resolved.clone(),
            });
            committed.insert(resolved);
        }

        let upload_candidates = entries
            .iter()
            .filter(|e| !e.is_index && e.path.is_file())
            .filter_map(|e| {
                let display_name = e.path.file_name()?.to_str()?.to_string();
                Some(UploadCandidate {
                    archive: archive.to_string(),
                    path: e.path.clone(),
                    display_name,
                })
            })
            .collect();

        Ok(ArchiveOutcome {
            archive: archive.to_string(),
            status: ArchiveStatus::Ok,
            upload_candidates,
            record: Some(record),
            renames,
            row_issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn stage(dir: &Path, files: &[(&str, &str)]) -> Vec<String> {
        for (name, content) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(path, content).expect("write member");
        }
        files.iter().map(|(name, _)| name.to_string()).collect()
    }

    const HEADER: &str = "File name,IC ID Number,Preferred,Last";

    #[test]
    fn renames_file_and_keeps_original_row() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\nimg1.jpg,,Jane,Doe\n");
        let members = stage(tmp.path(), &[("index.csv", index.as_str()), ("img1.jpg", "jpeg")]);
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch_01", tmp.path(), &members)
            .expect("reconcile");

        assert!(out.is_ok());
        assert_eq!(out.upload_candidates.len(), 1);
        assert_eq!(
            out.upload_candidates[0].display_name,
            "Doe, Jane - not admitted yet.jpg"
        );
        assert_eq!(out.upload_candidates[0].archive, "batch_01");
        assert!(tmp.path().join("Doe, Jane - not admitted yet.jpg").is_file());
        assert!(!tmp.path().join("img1.jpg").exists());

        let record = out.record.expect("record");
        assert_eq!(record.rows[0].values[0], "img1.jpg");
        assert_eq!(record.rows[0].archive, "batch_01");
    }

    #[test]
    fn first_row_wins_unsuffixed_name() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\nb.jpg,,Ann,Lee\na.jpg,,Ann,Lee\nc.png,,Ann,Lee\n");
        let members = stage(
            tmp.path(),
            &[("a.jpg", "A"), ("b.jpg", "B"), ("c.png", "C"), ("index.csv", index.as_str())],
        );
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect("reconcile");

        assert_eq!(
            out.renames,
            vec![
                Rename {
                    from: "b.jpg".into(),
                    to: "Lee, Ann - not admitted yet.jpg".into()
                },
                Rename {
                    from: "a.jpg".into(),
                    to: "Lee, Ann - not admitted yet (1).jpg".into()
                },
                Rename {
                    from: "c.png".into(),
                    to: "Lee, Ann - not admitted yet.png".into()
                },
            ]
        );
        let content = fs::read_to_string(tmp.path().join("Lee, Ann - not admitted yet.jpg"))
            .expect("read");
        assert_eq!(content, "B");
    }

    #[test]
    fn missing_file_is_row_issue_not_archive_failure() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\nghost.jpg,5,Kim,Park\nreal.jpg,6,Lou,Reed\n");
        let members = stage(tmp.path(), &[("index.csv", index.as_str()), ("real.jpg", "x")]);
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect("reconcile");

        assert!(out.is_ok());
        assert_eq!(
            out.row_issues,
            vec![RowIssue {
                row: 1,
                file_name: "ghost.jpg".into(),
                kind: RowIssueKind::FileMissing,
            }]
        );
        assert_eq!(out.record.expect("record").rows.len(), 2);
        assert!(tmp.path().join("Reed, Lou - 6.jpg").is_file());
    }

    #[test]
    fn index_member_is_never_uploaded_even_if_data_looks_like_header() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\nphoto.jpg,1,A,B\n");
        let members = stage(
            tmp.path(),
            &[
                ("index.csv", index.as_str()),
                ("photo.jpg", "File name,Last\n"),
                ("extra.txt", "unreferenced"),
            ],
        );
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect("reconcile");

        let names: Vec<_> = out
            .upload_candidates
            .iter()
            .map(|c| c.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["B, A - 1.jpg", "extra.txt"]);
    }

    #[test]
    fn does_not_clobber_unrelated_file_with_target_name() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\nnew.jpg,3,Al,Ng\n");
        let members = stage(
            tmp.path(),
            &[("index.csv", index.as_str()), ("Ng, Al - 3.jpg", "old"), ("new.jpg", "new")],
        );
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect("reconcile");

        assert_eq!(out.renames[0].to, "Ng, Al - 3 (1).jpg");
        assert_eq!(
            fs::read_to_string(tmp.path().join("Ng, Al - 3.jpg")).expect("read"),
            "old"
        );
    }

    #[test]
    fn file_already_named_canonically_keeps_its_name() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\n\"Ng, Al - 3.jpg\",3,Al,Ng\n");
        let members = stage(tmp.path(), &[("index.csv", index.as_str()), ("Ng, Al - 3.jpg", "x")]);
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect("reconcile");

        assert_eq!(out.renames[0].to, "Ng, Al - 3.jpg");
        assert_eq!(out.upload_candidates.len(), 1);
    }

    #[test]
    fn traversal_and_index_references_are_row_issues() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\n../etc/passwd,1,A,B\nindex.csv,2,C,D\n");
        let members = stage(tmp.path(), &[("index.csv", index.as_str())]);
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect("reconcile");

        let kinds: Vec<_> = out.row_issues.iter().map(|i| i.kind.clone()).collect();
        assert_eq!(kinds, vec![RowIssueKind::UnsafePath, RowIssueKind::IndexReference]);
        assert!(tmp.path().join("index.csv").is_file());
    }

    #[test]
    fn name_fields_cannot_move_files_out_of_the_archive() {
        let tmp = tempdir().expect("tempdir");
        let work = tmp.path().join("extract").join("batch");
        fs::create_dir_all(&work).expect("mkdir");
        let index = format!("{HEADER}\na.jpg,1,A,../x\nb.jpg,2,sub/dir,Ng\nc.jpg,3,Cy,Lo\n");
        let members = stage(
            &work,
            &[("index.csv", index.as_str()), ("a.jpg", "a"), ("b.jpg", "b"), ("c.jpg", "c")],
        );
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", &work, &members)
            .expect("reconcile");

        let kinds: Vec<_> = out.row_issues.iter().map(|i| (i.row, i.kind.clone())).collect();
        assert_eq!(
            kinds,
            vec![(1, RowIssueKind::UnsafeTarget), (2, RowIssueKind::UnsafeTarget)]
        );
        assert!(work.join("a.jpg").is_file());
        assert!(work.join("b.jpg").is_file());
        assert!(work.join("Lo, Cy - 3.jpg").is_file());
        assert!(!tmp.path().join("extract").join("x, A - 1.jpg").exists());
        assert_eq!(out.renames.len(), 1);
        assert_eq!(out.record.expect("record").rows.len(), 3);
        assert!(out.upload_candidates.iter().all(|c| c.path.starts_with(&work)));
    }

    #[test]
    fn duplicate_member_names_yield_one_candidate() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\na.jpg,1,A,B\n");
        let mut members = stage(
            tmp.path(),
            &[("index.csv", index.as_str()), ("a.jpg", "a"), ("extra.txt", "e")],
        );
        members.push("extra.txt".to_string());
        members.push("a.jpg".to_string());
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect("reconcile");

        let names: Vec<_> = out
            .upload_candidates
            .iter()
            .map(|c| c.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["B, A - 1.jpg", "extra.txt"]);
    }

    #[test]
    fn archive_without_index_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let members = stage(tmp.path(), &[("a.csv", "x,y\n"), ("b.jpg", "z")]);
        let cfg = IndexConfig::default();

        let err = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect_err("no index");
        assert!(err.to_string().contains("no index sheet"));
    }

    #[test]
    fn members_in_subfolders_resolve_by_relative_name() {
        let tmp = tempdir().expect("tempdir");
        let index = format!("{HEADER}\nphotos/p.jpg,9,Bo,Yu\n");
        let members = stage(tmp.path(), &[("photos/p.jpg", "p"), ("index.csv", index.as_str())]);
        let cfg = IndexConfig::default();

        let out = Reconciler::new(&cfg)
            .reconcile("batch", tmp.path(), &members)
            .expect("reconcile");

        assert!(tmp.path().join("Yu, Bo - 9.jpg").is_file());
        assert_eq!(out.upload_candidates[0].display_name, "Yu, Bo - 9.jpg");
    }

    #[test]
    fn normalizes_member_names() {
        assert_eq!(normalize_member_name("./a\\b.jpg"), "a/b.jpg");
        assert_eq!(normalize_member_name("/x.csv"), "x.csv");
    }
}
