//! Explicit on-disk cache store for all persisted artifacts.
//!
//! One `CacheStore` is constructed by the top-level workflow and passed by
//! reference to every component that needs it — there is no ambient global.
//! Each artifact lives in its own slot with a three-state lifecycle
//! (not-loaded / loaded-clean / loaded-dirty); state changes only on explicit
//! `load` / `set` / `save` calls.
//!
//! Reads are tolerant: a missing, malformed, or partially-written file loads
//! as the empty value (concurrent writers rewrite files whole, so a torn read
//! is indistinguishable from a cache miss and treated as one). Saves rewrite
//! the target atomically via a temp file + rename in the same directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ProjectLayout;
use crate::errors::SmartTestResult;
use crate::models::{AstParseCache, CoverageMap, DependencyGraph, FingerprintSnapshot, Outcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    NotLoaded,
    Clean,
    Dirty,
}

struct Slot<T> {
    path: PathBuf,
    value: T,
    state: SlotState,
}

impl<T: Default + Serialize + DeserializeOwned> Slot<T> {
    fn new(path: PathBuf) -> Self {
        Slot {
            path,
            value: T::default(),
            state: SlotState::NotLoaded,
        }
    }

    fn get(&mut self) -> &T {
        if self.state == SlotState::NotLoaded {
            self.load();
        }
        &self.value
    }

    fn get_mut(&mut self) -> &mut T {
        if self.state == SlotState::NotLoaded {
            self.load();
        }
        self.state = SlotState::Dirty;
        &mut self.value
    }

    fn set(&mut self, value: T) {
        self.value = value;
        self.state = SlotState::Dirty;
    }

    fn load(&mut self) {
        self.value = match std::fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(value) => value,
                Err(e) => {
                    warn!(path = %self.path.display(), "malformed cache file, treating as empty: {e}");
                    T::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read cache file: {e}");
                T::default()
            }
        };
        self.state = SlotState::Clean;
    }

    fn save(&mut self, force: bool) -> SmartTestResult<()> {
        if self.state != SlotState::Dirty && !force {
            return Ok(());
        }
        if self.state == SlotState::NotLoaded {
            debug!(path = %self.path.display(), "skipping save for unloaded slot");
            return Ok(());
        }
        atomic_write_json(&self.path, &self.value)?;
        self.state = SlotState::Clean;
        debug!(path = %self.path.display(), "saved cache file");
        Ok(())
    }
}

/// Serialize `value` to `path`, rewriting the file as a single atomic unit.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> SmartTestResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// All persisted smart-test state, one slot per artifact.
pub struct CacheStore {
    graph: Slot<DependencyGraph>,
    file_hashes: Slot<FingerprintSnapshot>,
    ast_cache: Slot<AstParseCache>,
    outcomes: Slot<BTreeMap<String, Outcome>>,
    coverage: Slot<CoverageMap>,
}

impl CacheStore {
    pub fn new(layout: &ProjectLayout) -> Self {
        CacheStore {
            graph: Slot::new(layout.graph_file()),
            file_hashes: Slot::new(layout.hashes_file()),
            ast_cache: Slot::new(layout.ast_cache_file()),
            outcomes: Slot::new(layout.outcomes_file()),
            coverage: Slot::new(layout.coverage_file()),
        }
    }

    // -- Dependency graph ---------------------------------------------------

    pub fn graph(&mut self) -> &DependencyGraph {
        self.graph.get()
    }

    pub fn set_graph(&mut self, graph: DependencyGraph) {
        self.graph.set(graph);
    }

    /// Whether a graph has ever been persisted. Distinct from loading: an
    /// absent file and an empty graph are different staleness signals.
    pub fn graph_file_exists(&self) -> bool {
        self.graph.path.exists()
    }

    // -- Fingerprint snapshot -----------------------------------------------

    pub fn file_hashes(&mut self) -> &FingerprintSnapshot {
        self.file_hashes.get()
    }

    pub fn set_file_hashes(&mut self, snapshot: FingerprintSnapshot) {
        self.file_hashes.set(snapshot);
    }

    pub fn hashes_file_exists(&self) -> bool {
        self.file_hashes.path.exists()
    }

    // -- AST parse cache ----------------------------------------------------

    pub fn ast_cache(&mut self) -> &AstParseCache {
        self.ast_cache.get()
    }

    pub fn update_ast_entry(&mut self, rel_path: &str, entry: crate::models::AstCacheEntry) {
        self.ast_cache.get_mut().insert(rel_path.to_string(), entry);
    }

    pub fn set_ast_cache(&mut self, cache: AstParseCache) {
        self.ast_cache.set(cache);
    }

    // -- Test outcomes ------------------------------------------------------

    pub fn outcomes(&mut self) -> &BTreeMap<String, Outcome> {
        self.outcomes.get()
    }

    /// Merge new outcomes into the stored map, keyed by node ID.
    pub fn record_outcomes(&mut self, outcomes: Vec<Outcome>) {
        let map = self.outcomes.get_mut();
        for outcome in outcomes {
            map.insert(outcome.node_id.clone(), outcome);
        }
    }

    // -- Coverage mapping ---------------------------------------------------

    pub fn coverage(&mut self) -> &CoverageMap {
        self.coverage.get()
    }

    pub fn set_coverage(&mut self, coverage: CoverageMap) {
        self.coverage.set(coverage);
    }

    // -- Persistence --------------------------------------------------------

    /// Save every dirty slot (or every loaded slot when `force`).
    pub fn save_all(&mut self, force: bool) -> SmartTestResult<()> {
        self.graph.save(force)?;
        self.file_hashes.save(force)?;
        self.ast_cache.save(force)?;
        self.outcomes.save(force)?;
        self.coverage.save(force)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
