//! The version-control boundary: one interface yielding file deltas for a
//! commit range. Renames surface as a delete plus an add.

use rpg_core::error::{Result, RpgError};
use std::path::Path;

/// Status of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
}

/// One changed file with its old and new contents.
#[derive(Debug, Clone)]
pub struct FileDelta {
    pub file: String,
    pub status: FileStatus,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
}

/// Produces the file deltas for a repository root and a range.
pub trait Vcs: Send + Sync {
    fn changed_files(&self, root: &Path, range: &str) -> Result<Vec<FileDelta>>;
}

/// git2-backed implementation. The range uses `<base>..<head>` syntax; a
/// bare revision diffs against `HEAD`.
pub struct GitVcs;

fn vcs_err(err: git2::Error) -> RpgError {
    RpgError::Vcs(err.to_string())
}

impl GitVcs {
    fn resolve_tree<'r>(repo: &'r git2::Repository, rev: &str) -> Result<git2::Tree<'r>> {
        let object = repo.revparse_single(rev).map_err(vcs_err)?;
        let commit = object.peel_to_commit().map_err(vcs_err)?;
        commit.tree().map_err(vcs_err)
    }

    fn blob_content(repo: &git2::Repository, id: git2::Oid) -> Option<String> {
        if id.is_zero() {
            return None;
        }
        let blob = repo.find_blob(id).ok()?;
        Some(String::from_utf8_lossy(blob.content()).to_string())
    }
}

impl Vcs for GitVcs {
    fn changed_files(&self, root: &Path, range: &str) -> Result<Vec<FileDelta>> {
        let repo = git2::Repository::open(root).map_err(vcs_err)?;
        let (base_rev, head_rev) = match range.split_once("..") {
            Some((base, head)) => (base, if head.is_empty() { "HEAD" } else { head }),
            None => (range, "HEAD"),
        };
        if base_rev.is_empty() {
            return Err(RpgError::Vcs(format!("invalid commit range '{range}'")));
        }

        let base_tree = Self::resolve_tree(&repo, base_rev)?;
        let head_tree = Self::resolve_tree(&repo, head_rev)?;
        // Rename detection stays off: a rename is a delete plus an add.
        let diff = repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
            .map_err(vcs_err)?;

        let mut deltas = Vec::new();
        diff.foreach(
            &mut |delta, _| {
                let old_path = delta
                    .old_file()
                    .path()
                    .map(|p| p.to_string_lossy().replace('\\', "/"));
                let new_path = delta
                    .new_file()
                    .path()
                    .map(|p| p.to_string_lossy().replace('\\', "/"));
                match delta.status() {
                    git2::Delta::Added => {
                        if let Some(file) = new_path {
                            deltas.push(FileDelta {
                                file,
                                status: FileStatus::Added,
                                old_content: None,
                                new_content: Self::blob_content(&repo, delta.new_file().id()),
                            });
                        }
                    }
                    git2::Delta::Deleted => {
                        if let Some(file) = old_path {
                            deltas.push(FileDelta {
                                file,
                                status: FileStatus::Deleted,
                                old_content: Self::blob_content(&repo, delta.old_file().id()),
                                new_content: None,
                            });
                        }
                    }
                    git2::Delta::Modified => {
                        if let Some(file) = new_path {
                            deltas.push(FileDelta {
                                file,
                                status: FileStatus::Modified,
                                old_content: Self::blob_content(&repo, delta.old_file().id()),
                                new_content: Self::blob_content(&repo, delta.new_file().id()),
                            });
                        }
                    }
                    _ => {}
                }
                true
            },
            None,
            None,
            None,
        )
        .map_err(vcs_err)?;

        deltas.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(deltas)
    }
}
