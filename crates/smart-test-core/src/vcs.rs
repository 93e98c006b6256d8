//! Version-control change detection.
//!
//! Git is the primary source of the changed-file set; when it is missing or
//! the command fails, detection degrades to fingerprint diffing against the
//! persisted snapshot.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, warn};

use crate::config::ProjectLayout;
use crate::store::cache::CacheStore;
use crate::store::fingerprints::changed_files_from_snapshot;

/// Changed files via `git diff --name-only`, against `base` or the index
/// when `staged`. Paths are repo-relative.
pub fn changed_files_from_git(
    layout: &ProjectLayout,
    store: &mut CacheStore,
    base: &str,
    staged: bool,
) -> Vec<PathBuf> {
    let mut cmd = Command::new("git");
    cmd.args(["diff", "--name-only"]).current_dir(&layout.repo_root);
    if staged {
        cmd.arg("--cached");
    } else {
        cmd.arg(base);
    }

    match cmd.output() {
        Ok(out) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            let files: Vec<PathBuf> = stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect();
            debug!(count = files.len(), "changed files from git diff");
            files
        }
        Ok(out) => {
            warn!(
                status = %out.status,
                "git diff failed, falling back to hash-based detection"
            );
            changed_files_from_snapshot(layout, store)
        }
        Err(e) => {
            warn!("failed to run git ({e}), falling back to hash-based detection");
            changed_files_from_snapshot(layout, store)
        }
    }
}

/// Unstaged and untracked files via `git status --porcelain`, restricted to
/// `*.py`. Renames contribute their new path.
pub fn working_tree_changes(layout: &ProjectLayout, store: &mut CacheStore) -> Vec<PathBuf> {
    let output = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(&layout.repo_root)
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            stdout
                .lines()
                .filter(|line| line.len() > 3)
                .filter_map(|line| {
                    let mut path = line[3..].trim();
                    if let Some((_, renamed)) = path.split_once(" -> ") {
                        path = renamed.trim();
                    }
                    path.ends_with(".py").then(|| PathBuf::from(path))
                })
                .collect()
        }
        Ok(out) => {
            warn!(
                status = %out.status,
                "git status failed, falling back to hash-based detection"
            );
            changed_files_from_snapshot(layout, store)
        }
        Err(e) => {
            warn!("failed to run git ({e}), falling back to hash-based detection");
            changed_files_from_snapshot(layout, store)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
