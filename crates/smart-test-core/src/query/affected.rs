//! Affected-set resolution: from changed files to modules and tests.

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;

use tracing::{debug, warn};

use crate::config::ProjectLayout;
use crate::indexer::filesystem::{module_name_from_repo_path, module_name_of};
use crate::models::{AffectedSet, CoverageMap, DependencyGraph};
use crate::store::coverage::tests_for_files;

/// Transitive closure over `imported_by` edges: every module that directly or
/// indirectly depends on one of the seeds, the seeds included.
pub fn transitive_dependents(
    graph: &DependencyGraph,
    seeds: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut affected: BTreeSet<String> = seeds.clone();
    let mut queue: VecDeque<String> = seeds.iter().cloned().collect();

    while let Some(current) = queue.pop_front() {
        if let Some(module) = graph.modules.get(&current) {
            for dependent in &module.imported_by {
                if affected.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
    }
    affected
}

/// Resolve a changed-file set against the graph.
///
/// Changed test files rerun themselves regardless of graph membership;
/// changed source files seed the dependents closure, whose modules then
/// contribute their mapped tests. Paths are repo-relative. Files matching
/// neither tree, or no graph entry, contribute nothing.
pub fn resolve_affected(
    graph: &DependencyGraph,
    changed_files: &[impl AsRef<Path>],
    layout: &ProjectLayout,
) -> AffectedSet {
    let src_prefix = layout.src_prefix();
    let test_prefix = layout.test_prefix();

    let mut seeds: BTreeSet<String> = BTreeSet::new();
    let mut tests: BTreeSet<String> = BTreeSet::new();

    for changed in changed_files {
        let rel = changed.as_ref().to_string_lossy().replace('\\', "/");
        if !rel.ends_with(".py") {
            continue;
        }

        if under_prefix(&rel, &test_prefix) {
            tests.insert(rel);
        } else if under_prefix(&rel, &src_prefix) {
            let abs = layout.repo_root.join(&rel);
            if abs.exists() {
                match module_name_of(&abs, &layout.src_root) {
                    Ok(name) if graph.modules.contains_key(&name) => {
                        seeds.insert(name);
                    }
                    Ok(name) => debug!(path = %rel, module = %name, "changed module not in graph"),
                    Err(e) => warn!(path = %rel, "cannot relate changed file to source root: {e}"),
                }
            } else {
                // Deleted: infer the module purely from path structure.
                if let Some(name) = module_name_from_repo_path(&rel, &src_prefix) {
                    if graph.modules.contains_key(&name) {
                        seeds.insert(name);
                    }
                }
            }
        }
    }

    let affected_modules = transitive_dependents(graph, &seeds);
    for module_name in &affected_modules {
        if let Some(module) = graph.modules.get(module_name) {
            tests.extend(module.tests.iter().cloned());
        }
    }

    AffectedSet {
        affected_modules: affected_modules.into_iter().collect(),
        tests: tests.into_iter().collect(),
    }
}

/// Like [`resolve_affected`], with coverage-observed tests unioned in.
/// Coverage never overrides the static result, only extends it.
pub fn resolve_affected_with_coverage(
    graph: &DependencyGraph,
    changed_files: &[impl AsRef<Path>],
    layout: &ProjectLayout,
    coverage: &CoverageMap,
) -> AffectedSet {
    let mut result = resolve_affected(graph, changed_files, layout);
    let covered = tests_for_files(coverage, changed_files);
    if !covered.is_empty() {
        let mut tests: BTreeSet<String> = result.tests.into_iter().collect();
        tests.extend(covered);
        result.tests = tests.into_iter().collect();
    }
    result
}

fn under_prefix(rel: &str, prefix: &str) -> bool {
    prefix.is_empty() || rel.starts_with(&format!("{prefix}/"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
