//! Shared typed models used across indexing, storage, and query layers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dependency graph
// ---------------------------------------------------------------------------

/// A single project-local module: its resolved imports, the file it lives in,
/// the inverse `imported_by` edges, and the test files mapped to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Sorted, deduplicated module names this module imports.
    pub imports: Vec<String>,
    /// Source file path relative to the repo root, forward-slash normalized.
    pub file: String,
    /// Modules that import this one. Rebuilt by full inversion, never
    /// authored directly.
    #[serde(default)]
    pub imported_by: Vec<String>,
    /// Test file paths associated with this module by the test mapper.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,
}

/// The persisted dependency graph: module name -> [`Module`], plus the
/// reverse test-file -> module-names map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub modules: BTreeMap<String, Module>,
    #[serde(default)]
    pub test_map: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Fingerprint snapshot
// ---------------------------------------------------------------------------

/// Content hashes for every tracked source and test file, keyed by
/// repo-relative path. The baseline against which "changed" is determined.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintSnapshot {
    pub files: BTreeMap<String, String>,
}

impl FingerprintSnapshot {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AST parse cache
// ---------------------------------------------------------------------------

/// Cached import-resolution result for one source file.
///
/// Reusable only when the file's current content hash matches `hash` AND the
/// module name recomputed from its path matches `module_name` (a file moved
/// without content change must not hit).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstCacheEntry {
    pub hash: String,
    pub module_name: String,
    pub imports: Vec<String>,
    pub timestamp: u64,
}

/// On-disk AST parse cache: repo-relative path -> entry. Insertion order is
/// preserved so incremental rewrites do not churn the file.
pub type AstParseCache = indexmap::IndexMap<String, AstCacheEntry>;

// ---------------------------------------------------------------------------
// Affected set
// ---------------------------------------------------------------------------

/// Result of an affected-set query: both lists sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedSet {
    pub affected_modules: Vec<String>,
    pub tests: Vec<String>,
}

// ---------------------------------------------------------------------------
// Test outcomes
// ---------------------------------------------------------------------------

/// Terminal status of a single test execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl OutcomeStatus {
    /// Failed and errored tests are both rerun candidates.
    pub fn is_failure(self) -> bool {
        matches!(self, OutcomeStatus::Failed | OutcomeStatus::Error)
    }
}

/// Result of a single test execution, consumed by the prioritizer only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Runner node ID, e.g. `tests/test_foo.py::test_bar`.
    pub node_id: String,
    pub status: OutcomeStatus,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Coverage supplement: source-file path -> test IDs observed touching it.
pub type CoverageMap = BTreeMap<String, Vec<String>>;
