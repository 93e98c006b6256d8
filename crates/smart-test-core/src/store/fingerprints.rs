//! Content fingerprints for change detection.
//!
//! Hashes are a change-detection checksum, not a security boundary; SHA-256
//! is used because it is what the rest of the stack already links.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::ProjectLayout;
use crate::errors::SmartTestResult;
use crate::indexer::filesystem::{iter_py_files, repo_relative};
use crate::models::FingerprintSnapshot;
use crate::store::cache::CacheStore;

/// Hex SHA-256 of the file's bytes.
pub fn compute_file_hash(path: &Path) -> SmartTestResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Every tracked `*.py` file: the source tree plus the test tree.
pub fn all_py_files(layout: &ProjectLayout) -> Vec<PathBuf> {
    let mut files = iter_py_files(&layout.src_root);
    // Flat layouts already include the test tree in the source walk.
    if !layout.test_root.starts_with(&layout.src_root) {
        files.extend(iter_py_files(&layout.test_root));
    }
    files
}

/// Compute the live snapshot of every tracked file. Unreadable files are
/// logged and skipped rather than failing the whole snapshot.
pub fn current_snapshot(layout: &ProjectLayout) -> FingerprintSnapshot {
    let mut snapshot = FingerprintSnapshot::default();
    for path in all_py_files(layout) {
        match compute_file_hash(&path) {
            Ok(hash) => {
                snapshot
                    .files
                    .insert(repo_relative(&path, &layout.repo_root), hash);
            }
            Err(e) => warn!(path = %path.display(), "failed to hash file: {e}"),
        }
    }
    snapshot
}

/// Repo-relative paths that differ between two snapshots: added and modified
/// keys first, then deleted keys.
pub fn snapshot_diff(old: &FingerprintSnapshot, new: &FingerprintSnapshot) -> Vec<String> {
    let mut changed = Vec::new();
    for (path, hash) in &new.files {
        match old.files.get(path) {
            None => {
                debug!(path = %path, "file added");
                changed.push(path.clone());
            }
            Some(old_hash) if old_hash != hash => {
                debug!(path = %path, "file modified");
                changed.push(path.clone());
            }
            Some(_) => {}
        }
    }
    for path in old.files.keys() {
        if !new.files.contains_key(path) {
            debug!(path = %path, "file deleted");
            changed.push(path.clone());
        }
    }
    changed
}

/// Fingerprint-diff fallback for when version control is unavailable.
///
/// With no persisted baseline everything counts as changed. Returned paths
/// are repo-relative.
pub fn changed_files_from_snapshot(
    layout: &ProjectLayout,
    store: &mut CacheStore,
) -> Vec<PathBuf> {
    info!("using hash-based change detection");
    let old = store.file_hashes().clone();
    if old.is_empty() {
        warn!("no saved hashes found, assuming all files are new/changed");
        return all_py_files(layout)
            .into_iter()
            .map(|p| PathBuf::from(repo_relative(&p, &layout.repo_root)))
            .collect();
    }
    let new = current_snapshot(layout);
    snapshot_diff(&old, &new).into_iter().map(PathBuf::from).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
