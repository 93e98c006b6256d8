//! Graph staleness detection.
//!
//! The persisted graph is trustworthy only while the persisted fingerprint
//! snapshot still matches the live file system. Detection short-circuits on
//! the first qualifying reason.

use std::fmt;

use tracing::info;

use crate::config::ProjectLayout;
use crate::store::cache::CacheStore;
use crate::store::fingerprints::current_snapshot;

/// First detected reason the persisted graph can no longer be trusted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StaleReason {
    MissingGraph,
    MissingHashes,
    FileAdded(String),
    FileModified(String),
    FileDeleted(String),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::MissingGraph => write!(f, "graph file does not exist"),
            StaleReason::MissingHashes => write!(f, "no stored file hashes found"),
            StaleReason::FileAdded(path) => write!(f, "new file detected: {path}"),
            StaleReason::FileModified(path) => write!(f, "file modified: {path}"),
            StaleReason::FileDeleted(path) => write!(f, "file deleted: {path}"),
        }
    }
}

/// Compare persisted state against the live tree. `None` means fresh.
pub fn staleness(layout: &ProjectLayout, store: &mut CacheStore) -> Option<StaleReason> {
    if !store.graph_file_exists() {
        return Some(StaleReason::MissingGraph);
    }

    let stored = store.file_hashes().clone();
    if stored.is_empty() {
        return Some(StaleReason::MissingHashes);
    }

    let current = current_snapshot(layout);
    for (path, hash) in &current.files {
        match stored.files.get(path) {
            None => return Some(StaleReason::FileAdded(path.clone())),
            Some(stored_hash) if stored_hash != hash => {
                return Some(StaleReason::FileModified(path.clone()))
            }
            Some(_) => {}
        }
    }
    for path in stored.files.keys() {
        if !current.files.contains_key(path) {
            return Some(StaleReason::FileDeleted(path.clone()));
        }
    }

    info!("graph is up to date");
    None
}

pub fn is_graph_stale(layout: &ProjectLayout, store: &mut CacheStore) -> bool {
    staleness(layout, store).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyGraph;
    use std::path::Path;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
    }

    fn fresh_project() -> (tempfile::TempDir, ProjectLayout, CacheStore) {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "src/pkg/__init__.py", "");
        write(tmp.path(), "src/pkg/a.py", "X = 1\n");
        write(tmp.path(), "tests/test_a.py", "def test_x():\n    pass\n");
        let layout = ProjectLayout {
            repo_root: tmp.path().to_path_buf(),
            src_root: tmp.path().join("src"),
            test_root: tmp.path().join("tests"),
            packages: vec!["pkg".to_string()],
            default_branch: "main".to_string(),
        };

        // Persist a graph and a matching snapshot: the fresh state.
        let mut store = CacheStore::new(&layout);
        store.set_graph(DependencyGraph::default());
        store.set_file_hashes(current_snapshot(&layout));
        store.save_all(false).unwrap();
        (tmp, layout, store)
    }

    #[test]
    fn test_fresh_after_rebuild_and_snapshot() {
        let (_tmp, layout, mut store) = fresh_project();
        assert_eq!(staleness(&layout, &mut store), None);
        assert!(!is_graph_stale(&layout, &mut store));
    }

    #[test]
    fn test_missing_graph_is_stale() {
        let (_tmp, layout, mut store) = fresh_project();
        std::fs::remove_file(layout.graph_file()).unwrap();
        assert_eq!(
            staleness(&layout, &mut store),
            Some(StaleReason::MissingGraph)
        );
    }

    #[test]
    fn test_missing_hashes_is_stale() {
        let (_tmp, layout, mut store) = fresh_project();
        store.set_file_hashes(Default::default());
        store.save_all(false).unwrap();
        assert_eq!(
            staleness(&layout, &mut store),
            Some(StaleReason::MissingHashes)
        );
    }

    #[test]
    fn test_modified_file_is_stale() {
        let (tmp, layout, mut store) = fresh_project();
        write(tmp.path(), "src/pkg/a.py", "X = 2\n");
        assert_eq!(
            staleness(&layout, &mut store),
            Some(StaleReason::FileModified("src/pkg/a.py".to_string()))
        );
    }

    #[test]
    fn test_added_file_is_stale() {
        let (tmp, layout, mut store) = fresh_project();
        write(tmp.path(), "src/pkg/b.py", "");
        assert_eq!(
            staleness(&layout, &mut store),
            Some(StaleReason::FileAdded("src/pkg/b.py".to_string()))
        );
    }

    #[test]
    fn test_deleted_file_is_stale() {
        let (tmp, layout, mut store) = fresh_project();
        std::fs::remove_file(tmp.path().join("tests/test_a.py")).unwrap();
        assert_eq!(
            staleness(&layout, &mut store),
            Some(StaleReason::FileDeleted("tests/test_a.py".to_string()))
        );
    }

    #[test]
    fn test_test_tree_changes_count() {
        let (tmp, layout, mut store) = fresh_project();
        write(tmp.path(), "tests/test_a.py", "def test_y():\n    pass\n");
        assert_eq!(
            staleness(&layout, &mut store),
            Some(StaleReason::FileModified("tests/test_a.py".to_string()))
        );
    }
}
