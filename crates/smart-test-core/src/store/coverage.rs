//! Optional coverage-derived test mapping.
//!
//! An external coverage collector may persist a map from source-file path to
//! the test IDs observed exercising it. Coverage data is a best-effort
//! supplement: results are unioned with the static affected set, and an
//! absent or empty map changes nothing.

use std::collections::BTreeSet;
use std::path::Path;

use crate::models::CoverageMap;

/// Tests recorded as touching any of the changed files.
pub fn tests_for_files(coverage: &CoverageMap, changed: &[impl AsRef<Path>]) -> BTreeSet<String> {
    let mut tests = BTreeSet::new();
    for path in changed {
        let key = path.as_ref().to_string_lossy().replace('\\', "/");
        if let Some(entries) = coverage.get(&key) {
            tests.extend(entries.iter().cloned());
        }
    }
    tests
}

/// Merge freshly collected coverage into the stored map, unioning and
/// sorting the per-file test lists.
pub fn merge_coverage(existing: &mut CoverageMap, fresh: &CoverageMap) {
    for (file, tests) in fresh {
        let entry = existing.entry(file.clone()).or_default();
        let mut merged: BTreeSet<String> = entry.iter().cloned().collect();
        merged.extend(tests.iter().cloned());
        *entry = merged.into_iter().collect();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
