//! Test-to-module mapping by filename/path convention.
//!
//! `tests/core/test_backtest.py` is a candidate for module `core.backtest`
//! and, for each discovered top-level package, `<package>.core.backtest`.
//! Files matching no module are left unmapped — no fuzzy guessing.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::config::ProjectLayout;
use crate::indexer::filesystem::{iter_py_files, repo_relative};
use crate::models::DependencyGraph;

/// Map every conventionally named test file under the test root to the
/// module(s) it appears to test. Keys are module names, values are
/// repo-relative test file paths.
pub fn map_tests_to_modules(
    layout: &ProjectLayout,
    universe: &BTreeSet<String>,
) -> BTreeMap<String, Vec<String>> {
    let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for test_file in iter_py_files(&layout.test_root) {
        let file_name = match test_file.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        let base_name = match file_name
            .strip_prefix("test_")
            .and_then(|rest| rest.strip_suffix(".py"))
        {
            Some(base) => base,
            None => continue,
        };

        let rel = match test_file.strip_prefix(&layout.test_root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let mut candidate_parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(os) => Some(os.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();
        candidate_parts.pop();
        candidate_parts.push(base_name.to_string());
        let candidate = candidate_parts.join(".");

        let test_file_str = repo_relative(&test_file, &layout.repo_root);

        let mut matches: Vec<String> = Vec::new();
        if universe.contains(&candidate) {
            matches.push(candidate.clone());
        }
        for pkg in &layout.packages {
            let prefixed = format!("{pkg}.{candidate}");
            if universe.contains(&prefixed) {
                matches.push(prefixed);
            }
        }

        if matches.is_empty() {
            debug!(test = %test_file_str, candidate = %candidate, "no module match for test file");
            continue;
        }
        for module in matches {
            mapping.entry(module).or_default().push(test_file_str.clone());
        }
    }

    info!(mapped = mapping.len(), "test-to-module mapping complete");
    mapping
}

/// Merge a test mapping into the graph: each module's `tests` list (sorted,
/// deduplicated) plus the reverse `test_map` from test path to module names.
pub fn apply_test_map(graph: &mut DependencyGraph, mapping: BTreeMap<String, Vec<String>>) {
    graph.test_map.clear();
    for (module_name, tests) in mapping {
        let deduped: BTreeSet<String> = tests.into_iter().collect();
        for test in &deduped {
            graph
                .test_map
                .entry(test.clone())
                .or_default()
                .push(module_name.clone());
        }
        if let Some(module) = graph.modules.get_mut(&module_name) {
            module.tests = deduped.into_iter().collect();
        }
    }
    for modules in graph.test_map.values_mut() {
        modules.sort();
        modules.dedup();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
